use std::collections::BTreeSet;

#[test]
fn manifest_features_all_gate_something() {
    let manifest: toml::Value = toml::from_str(include_str!("../Cargo.toml")).unwrap();
    let features: BTreeSet<&str> = manifest["features"]
        .as_table()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    // Единственный флаг `parallel` включает rayon
    assert_eq!(features, BTreeSet::from(["default", "parallel"]));
    assert_eq!(
        manifest["features"]["parallel"].as_array().unwrap()[0].as_str(),
        Some("dep:rayon")
    );
}
