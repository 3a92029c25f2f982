//! Merchant-origin classification of story links.
//!
//! Links in story stickers point at an interstitial redirect whose `u=`
//! parameter carries the real destination. Classification unwraps that
//! redirect when present, then matches the destination host (minus a
//! leading `www.`) exactly against a fixed table. Matching is exact, never
//! substring.

use url::Url;

/// Known link origins plus the sentinel for everything else.
///
/// Classification never fails: an unknown host is `Unclassified`, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkCategory {
    Amazon,
    MercadoLivre,
    Shopee,
    Natura,
    MagazineLuiza,
    ElaUsa,
    EpocaCosmeticos,
    WhatsApp,
    Google,
    Shortener,
    Instagram,
    Unclassified,
}

impl LinkCategory {
    pub fn label(&self) -> &'static str {
        match self {
            LinkCategory::Amazon => "Amazon",
            LinkCategory::MercadoLivre => "Mercado Livre",
            LinkCategory::Shopee => "Shopee",
            LinkCategory::Natura => "Natura",
            LinkCategory::MagazineLuiza => "Magazine Luiza",
            LinkCategory::ElaUsa => "Ela Usa",
            LinkCategory::EpocaCosmeticos => "Época Cosméticos",
            LinkCategory::WhatsApp => "WhatsApp",
            LinkCategory::Google => "Google",
            LinkCategory::Shortener => "Encurtador",
            LinkCategory::Instagram => "Instagram",
            LinkCategory::Unclassified => "Unclassified",
        }
    }
}

impl std::fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Host table. Finite and static; every entry is an exact host after the
/// `www.` strip.
const HOST_TABLE: &[(&str, LinkCategory)] = &[
    ("amzlink.to", LinkCategory::Amazon),
    ("mercadolivre.com", LinkCategory::MercadoLivre),
    ("mercadolivre.com.br", LinkCategory::MercadoLivre),
    ("produto.mercadolivre.com.br", LinkCategory::MercadoLivre),
    ("s.shopee.com.br", LinkCategory::Shopee),
    ("br.shp.ee", LinkCategory::Shopee),
    ("minhaloja.natura.com", LinkCategory::Natura),
    ("sminhaloja.natura.com", LinkCategory::Natura),
    ("natura.com.br", LinkCategory::Natura),
    ("magazinevoce.com.br", LinkCategory::MagazineLuiza),
    ("elausa.com.br", LinkCategory::ElaUsa),
    ("epocacosmeticos.com.br", LinkCategory::EpocaCosmeticos),
    ("api.whatsapp.com", LinkCategory::WhatsApp),
    ("google.com", LinkCategory::Google),
    ("encurtador.com.br", LinkCategory::Shortener),
    ("tinyurl.com", LinkCategory::Shortener),
    ("instagram.com", LinkCategory::Instagram),
];

/// Classify one story-link URL. Pure and total: anything unparseable or
/// unknown is `Unclassified`.
pub fn classify(raw_url: &str) -> LinkCategory {
    let Ok(parsed) = Url::parse(raw_url) else {
        return LinkCategory::Unclassified;
    };
    let destination = unwrap_interstitial(&parsed).unwrap_or(parsed);

    let Some(host) = destination.host_str() else {
        return LinkCategory::Unclassified;
    };
    let host = host.strip_prefix("www.").unwrap_or(host);

    HOST_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == host)
        .map(|(_, category)| *category)
        .unwrap_or(LinkCategory::Unclassified)
}

/// Sticker URLs usually pass through the platform's redirect page with the
/// real destination percent-encoded in `u=`. Returns the inner URL when the
/// parameter is present and parseable.
fn unwrap_interstitial(url: &Url) -> Option<Url> {
    let (_, inner) = url.query_pairs().find(|(name, _)| name == "u")?;
    Url::parse(&inner).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_hosts_map_to_their_origin() {
        assert_eq!(classify("https://s.shopee.com.br/xyz"), LinkCategory::Shopee);
        assert_eq!(classify("https://br.shp.ee/abc"), LinkCategory::Shopee);
        assert_eq!(
            classify("https://produto.mercadolivre.com.br/MLB-123"),
            LinkCategory::MercadoLivre
        );
        assert_eq!(
            classify("https://api.whatsapp.com/send?phone=5511999999999"),
            LinkCategory::WhatsApp
        );
        assert_eq!(classify("https://tinyurl.com/2p9u"), LinkCategory::Shortener);
        assert_eq!(
            classify("https://minhaloja.natura.com/loja/ana"),
            LinkCategory::Natura
        );
        assert_eq!(
            classify("https://epocacosmeticos.com.br/p/123"),
            LinkCategory::EpocaCosmeticos
        );
    }

    #[test]
    fn leading_www_is_stripped_before_matching() {
        assert_eq!(classify("https://www.google.com/search?q=x"), LinkCategory::Google);
        assert_eq!(
            classify("https://www.magazinevoce.com.br/loja"),
            LinkCategory::MagazineLuiza
        );
    }

    #[test]
    fn interstitial_redirects_classify_their_destination() {
        let wrapped = "https://l.instagram.com/?u=https%3A%2F%2Fs.shopee.com.br%2F8zWvJ%3Ffbclid%3Dabc&e=AT0";
        assert_eq!(classify(wrapped), LinkCategory::Shopee);

        let wrapped_ml =
            "https://l.instagram.com/?u=https%3A%2F%2Fwww.mercadolivre.com.br%2Fitem%2FMLB123";
        assert_eq!(classify(wrapped_ml), LinkCategory::MercadoLivre);
    }

    #[test]
    fn matching_is_exact_not_substring() {
        // A host that merely contains a known host must not match.
        assert_eq!(
            classify("https://google.com.evil.example/phish"),
            LinkCategory::Unclassified
        );
        assert_eq!(
            classify("https://fake-s.shopee.com.br.example/x"),
            LinkCategory::Unclassified
        );
    }

    #[test]
    fn unknown_and_unparseable_inputs_hit_the_sentinel() {
        assert_eq!(classify("https://example.com/a"), LinkCategory::Unclassified);
        assert_eq!(classify("not a url at all"), LinkCategory::Unclassified);
        assert_eq!(classify(""), LinkCategory::Unclassified);
        assert_eq!(classify("mailto:x@example.com"), LinkCategory::Unclassified);
    }

    #[test]
    fn classification_is_idempotent() {
        let inputs = [
            "https://s.shopee.com.br/xyz",
            "https://unknown.example/1",
            "broken",
        ];
        for input in inputs {
            assert_eq!(classify(input), classify(input));
        }
    }

    #[test]
    fn labels_render_for_the_export() {
        assert_eq!(LinkCategory::MercadoLivre.to_string(), "Mercado Livre");
        assert_eq!(LinkCategory::Shortener.to_string(), "Encurtador");
        assert_eq!(LinkCategory::Unclassified.to_string(), "Unclassified");
    }
}
