//! Filesystem round trip: read sources from a directory, run the engine,
//! apply the fixes to disk, and verify a re-check comes back clean.

use std::collections::BTreeMap;
use std::fs;

use downlift::engine::{Downport, DownportConf};
use downlift_syntax::{AbapVersion, Registry, RegistryConfig};

fn registry_from_dir(dir: &std::path::Path) -> Registry {
    let mut reg = Registry::new(RegistryConfig {
        version: AbapVersion::V702,
        ..RegistryConfig::default()
    });
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("abap") {
            continue;
        }
        let filename = path.file_name().unwrap().to_str().unwrap().to_string();
        reg.add_file(filename, fs::read_to_string(&path).unwrap());
    }
    reg.parse();
    reg
}

#[test]
fn fixes_applied_to_disk_converge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zprog.prog.abap");
    fs::write(&path, "DATA(x) = 1.\nTYPES ty TYPE TABLE OF t WITH EMPTY KEY.\n").unwrap();

    for _ in 0..10 {
        let reg = registry_from_dir(dir.path());
        let engine = Downport::initialize(&reg, DownportConf::default());
        let mut issues = Vec::new();
        for object in reg.objects() {
            issues.extend(engine.run(object));
        }
        let Some(issue) = issues.iter().find(|i| i.has_fix()) else {
            assert!(issues.is_empty(), "only fixable issues expected here");
            let final_text = fs::read_to_string(&path).unwrap();
            assert!(final_text.contains("DATA x LIKE 1."));
            assert!(final_text.contains("WITH DEFAULT KEY"));
            return;
        };

        let mut contents: BTreeMap<String, String> = BTreeMap::new();
        for object in reg.objects() {
            for file in object.files() {
                contents.insert(file.filename().to_string(), file.source().to_string());
            }
        }
        issue.fix.as_ref().unwrap().apply(&mut contents).unwrap();
        fs::write(&path, contents.get("zprog.prog.abap").unwrap()).unwrap();
    }
    panic!("fix application did not converge");
}
