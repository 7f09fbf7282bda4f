//! Type index <-> packed type bijection over generated classifications.

use mwm_format::classifier::{write_config, ClassifierRegistry, STUB_NODE_NAME};
use proptest::prelude::*;

/// Config text plus every `|`-joined path it declares.
fn classification(shape: &[usize]) -> (String, Vec<String>) {
    let mut config = String::new();
    let mut paths = Vec::new();
    for (i, &children) in shape.iter().enumerate() {
        config.push_str(&format!("group{i}\n"));
        paths.push(format!("group{i}"));
        for j in 0..children {
            config.push_str(&format!("  leaf{j}\n"));
            paths.push(format!("group{i}|leaf{j}"));
        }
    }
    (config, paths)
}

fn registry_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    prop::collection::vec(0usize..6, 1..8).prop_flat_map(|shape| {
        let (config, paths) = classification(&shape);
        (Just(config), Just(paths).prop_shuffle())
    })
}

proptest! {
    #[test]
    fn index_round_trips((config, paths) in registry_strategy(), beyond in 0u32..1000) {
        let reg = ClassifierRegistry::load(&config, &paths.join("\n")).unwrap();
        prop_assert_eq!(reg.len(), paths.len());
        for i in 0..reg.len() as u32 {
            let t = reg.type_for_index(i);
            prop_assert_eq!(reg.index_for_type(t), Some(i));
            prop_assert_eq!(&reg.path_by_type(t), &paths[i as usize]);
        }
        let out_of_range = reg.len() as u32 + beyond;
        prop_assert_eq!(reg.type_for_index(out_of_range), reg.stub_type());
        prop_assert_eq!(reg.path_by_type(reg.stub_type()), STUB_NODE_NAME);
    }

    #[test]
    fn config_text_survives_rewrite((config, paths) in registry_strategy()) {
        let reg = ClassifierRegistry::load(&config, &paths.join("\n")).unwrap();
        let again = ClassifierRegistry::load(&write_config(&reg), &paths.join("\n")).unwrap();
        for i in 0..reg.len() as u32 {
            prop_assert_eq!(reg.type_for_index(i), again.type_for_index(i));
        }
        prop_assert_eq!(reg.stub_type(), again.stub_type());
    }
}
