//! Snapshot tests
//!
//! Loads each fixtures/*.json file individually and compares if the
//! fully resolved configuration changes.

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("JCFG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    insta::glob!("fixtures/*.json", |path| {
        let config =
            jcfg::load(path, &jcfg::LoadOptions::default()).expect("must be a valid config");

        insta::assert_json_snapshot!(config);
    });
}
