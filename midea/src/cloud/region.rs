//! Region table mapping a country/region code to the cloud endpoint and
//! built-in app credentials to use against it (spec §6 "Cloud client").

pub const DEFAULT_CLOUD_REGION: &str = "United States";

#[derive(Debug, Clone)]
pub struct RegionConfig {
    pub base_url: &'static str,
    pub app_id: &'static str,
    pub app_key: &'static str,
    pub login_account: &'static str,
    pub login_password: &'static str,
}

/// Built-in NetHome+ credentials, keyed by region name. Mirrors the
/// hard-coded `CLOUD_CREDENTIALS` table the official app ships with; these
/// are shared app-level accounts, not end-user credentials.
pub fn nethome_region(region: &str) -> Option<RegionConfig> {
    match region {
        "United States" => Some(RegionConfig {
            base_url: "https://mapp.appsmb.com",
            app_id: "1017",
            app_key: "446F2982E0AE4EA98630F1C5D58A4F74",
            login_account: "user@midea-us.com",
            login_password: "midea-us",
        }),
        "China" => Some(RegionConfig {
            base_url: "https://mapp.appsmb.com",
            app_id: "1117",
            app_key: "ac21b9f9cbfe4ca5a88562ef25e2b768",
            login_account: "user@midea-cn.com",
            login_password: "midea-cn",
        }),
        _ => None,
    }
}

/// SmartHome cloud uses a single global endpoint rather than a per-region
/// table.
pub fn smarthome_base_url() -> &'static str {
    "https://mp-prod.appsmb.com"
}
