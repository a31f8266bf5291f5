use time::{format_description::well_known::Iso8601, OffsetDateTime};

/// Build date for `--version`. `SOURCE_DATE_EPOCH` pins it for reproducible builds.
fn build_date() -> String {
    let when = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|epoch| epoch.trim().parse::<i64>().ok())
        .and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);
    when.date()
        .format(&Iso8601::DATE)
        .unwrap_or_else(|_| "unknown".to_string())
}

fn main() {
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rustc-env=MJCF_USD_BUILD_DATE={}", build_date());
    println!("cargo:rustc-env=MJCF_USD_BUILD_TARGET={target}");
}
