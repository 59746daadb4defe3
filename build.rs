use time::OffsetDateTime;

/// Build timestamp; `SOURCE_DATE_EPOCH` pins it for reproducible builds.
fn stamp() -> OffsetDateTime {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

fn main() {
    let at = stamp();
    let date = format!("{:04}-{:02}-{:02}", at.year(), u8::from(at.month()), at.day());
    let clock = format!("{:02}:{:02}:{:02}Z", at.hour(), at.minute(), at.second());

    for (key, fallback) in [("AHDS_BUILD_DATE", date), ("AHDS_BUILD_TIME", clock)] {
        let value = std::env::var(key).unwrap_or(fallback);
        println!("cargo:rustc-env={}={}", key, value);
        println!("cargo:rerun-if-env-changed={}", key);
    }
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=build.rs");
}
