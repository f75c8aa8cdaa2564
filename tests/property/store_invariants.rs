//! Property-based tests for upsert and ordering guarantees

use proptest::prelude::*;
use std::collections::HashMap;
use zclgen::query::{ClusterDef, Seeding};
use zclgen::store::Store;
use zclgen::types::{PackageType, Side};

/// Key-values keep one row per key, the last value written, in order of
/// first insertion.
#[test]
fn key_value_upsert_property() {
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(32));

    runner
        .run(
            &prop::collection::vec(("[a-d]", "[a-z0-9]{0,6}"), 0..24),
            |writes| {
                let store = Store::temporary().unwrap();
                let session = store.ensure_session("prop", None).unwrap();

                let mut expected_order: Vec<String> = Vec::new();
                let mut expected_value: HashMap<String, String> = HashMap::new();
                for (key, value) in &writes {
                    store.update_key_value(session, key, value).unwrap();
                    if !expected_order.contains(key) {
                        expected_order.push(key.clone());
                    }
                    expected_value.insert(key.clone(), value.clone());
                }

                let rows = store.get_all_session_key_values(session).unwrap();
                let keys: Vec<String> = rows.iter().map(|kv| kv.key.clone()).collect();
                prop_assert_eq!(&keys, &expected_order);
                for kv in &rows {
                    prop_assert_eq!(Some(&kv.value), expected_value.get(&kv.key));
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Any sequence of cluster state writes leaves at most one row per
/// (cluster, side), carrying the last value and the id of the first write.
#[test]
fn cluster_state_replace_property() {
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(24));

    runner
        .run(
            &prop::collection::vec((0usize..3, any::<bool>(), any::<bool>()), 1..30),
            |writes| {
                let store = Store::temporary().unwrap();
                let package = store
                    .insert_package("/prop/zcl.json", 7, PackageType::SpecProperties, None)
                    .unwrap();
                let defs: Vec<ClusterDef> = (0..3u32)
                    .map(|code| ClusterDef {
                        code,
                        manufacturer_code: None,
                        name: format!("cluster {code}"),
                        description: String::new(),
                        define: format!("CLUSTER_{code}"),
                        domain: None,
                    })
                    .collect();
                let clusters = store.insert_clusters(package, &defs).unwrap();
                let session = store.ensure_session("prop", None).unwrap();
                let et = store
                    .insert_endpoint_type(session, "et", None, Seeding::Empty)
                    .unwrap();

                let mut first_id = HashMap::new();
                let mut last = HashMap::new();
                for (index, server, enabled) in &writes {
                    let side = if *server { Side::Server } else { Side::Client };
                    let id = store
                        .insert_or_replace_cluster_state(et, clusters[*index], side, *enabled)
                        .unwrap();
                    first_id.entry((clusters[*index], side)).or_insert(id);
                    last.insert((clusters[*index], side), *enabled);
                }

                let rows = store.get_all_endpoint_type_cluster_state(et).unwrap();
                prop_assert_eq!(rows.len(), last.len());
                for row in &rows {
                    let key = (row.cluster, row.side);
                    prop_assert_eq!(Some(&row.enabled), last.get(&key));
                    prop_assert_eq!(Some(&row.id), first_id.get(&key));
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Protocol codes written as decimal or `0x` hex parse to the same value.
#[test]
fn code_parsing_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&any::<u16>(), |code| {
            let code = u32::from(code);
            prop_assert_eq!(zclgen::types::parse_code(&code.to_string()), Ok(code));
            prop_assert_eq!(zclgen::types::parse_code(&format!("0x{:04X}", code)), Ok(code));
            prop_assert_eq!(zclgen::types::parse_code(&zclgen::types::hex_code(code)), Ok(code));
            Ok(())
        })
        .unwrap();
}
