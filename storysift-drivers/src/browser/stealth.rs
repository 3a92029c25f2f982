use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Levels of stealth applied to the browser session.
pub enum StealthProfile {
    Lightweight,
    Balanced,
    Maximum,
}

/// Construct Chrome command‑line arguments for a given stealth profile
/// and fingerprint.
///
/// The baseline set mirrors what a hardened headless deployment needs to
/// survive containerised environments while keeping automation markers out
/// of the renderer.
pub fn build_stealth_arguments(
    profile: &StealthProfile,
    user_profile: &super::fingerprint::UserAgentProfile,
) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        "--disable-software-rasterizer".to_string(),
        "--start-maximized".to_string(),
        format!("--user-agent={}", user_profile.user_agent),
        format!(
            "--window-size={},{}",
            user_profile.viewport.0, user_profile.viewport.1
        ),
        format!("--lang={}", user_profile.languages.join(",")),
        format!("--accept-language={}", user_profile.accept_language),
    ];
    if let StealthProfile::Maximum = profile {
        args.push("--disable-gpu".to_string());
    }
    args
}

/// JavaScript evasions applied at page load to reduce automation signals.
pub struct StealthScripts;

impl StealthScripts {
    pub fn get_core_evasions() -> &'static str {
        r#"
            Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
            Object.defineProperty(navigator, 'plugins', { get: () => [1,2,3] });
            if (!window.chrome) window.chrome = { runtime: {} };
        "#
    }

    /// Locale evasion is generated per fingerprint so the JS layer agrees
    /// with the Accept-Language header.
    pub fn language_evasion(languages: &[String]) -> String {
        let list = languages
            .iter()
            .map(|l| format!("'{l}'"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Object.defineProperty(navigator, 'languages', {{ get: () => [{list}] }});")
    }

    pub fn get_webgl_evasions() -> &'static str {
        r#"
            const getParameter = WebGLRenderingContext.prototype.getParameter;
            WebGLRenderingContext.prototype.getParameter = function(parameter) {
                if (parameter === 37445) return 'Intel Inc.';
                if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                return getParameter.call(this, parameter);
            };
        "#
    }

    pub fn get_canvas_evasions() -> &'static str {
        r#"
            const getContext = HTMLCanvasElement.prototype.getContext;
            HTMLCanvasElement.prototype.getContext = function(type,...args){
                const ctx = getContext.call(this,type,...args);
                if(type==='2d' && ctx) {
                    const origToDataURL=this.toDataURL;
                    this.toDataURL=function(...a){
                        const imgdata=ctx.getImageData(0,0,this.width,this.height);
                        for(let i=0;i<imgdata.data.length;i+=4){
                            if(Math.random()<0.001)imgdata.data[i]+=Math.random()<0.5?-1:1;
                        }
                        ctx.putImageData(imgdata,0,0);
                        return origToDataURL.call(this,...a);
                    };
                }
                return ctx;
            };
        "#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fingerprint::UserAgentManager;

    #[test]
    fn maximum_profile_disables_gpu() {
        let mut manager = UserAgentManager::new();
        let profile = manager.get_session_profile(&StealthProfile::Maximum).clone();
        let args = build_stealth_arguments(&StealthProfile::Maximum, &profile);
        assert!(args.iter().any(|a| a == "--disable-gpu"));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=")));
    }

    #[test]
    fn language_evasion_quotes_each_entry() {
        let script =
            StealthScripts::language_evasion(&["pt-BR".to_string(), "en-US".to_string()]);
        assert!(script.contains("'pt-BR', 'en-US'"));
    }
}
