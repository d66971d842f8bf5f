//! Persistence and recovery tests for the redb-backed graph.
//!
//! These tests verify that nodes, relationships and their attributes survive
//! a close + reopen cycle, and that reopening never duplicates data.

use std::path::Path;

use medkg::config::MedConfig;
use medkg::graph::{GraphReader, GraphWriter};
use medkg::schema::{NodeKey, NodeLabel, PropValue, RelationType};
use medkg::seeds::SeedPack;
use medkg::store::{Direction, GraphStore, MemGraph};

fn persistent_config(dir: &Path) -> MedConfig {
    let mut config = MedConfig::default();
    config.store.data_dir = Some(dir.to_path_buf());
    config
}

fn keys(nodes: Vec<medkg::store::NodeRecord>) -> Vec<String> {
    nodes.into_iter().map(|n| n.key).collect()
}

#[test]
fn patient_records_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    // First session: write a patient with a visit.
    {
        let g = MemGraph::open(dir.path()).unwrap();
        let w = GraphWriter::new(&g);
        w.create_patient("Omar", Some(52), Some("M")).unwrap();
        w.patient_add_symptom("Omar", "Headache", Some("mild"), Some(3))
            .unwrap();
        w.patient_add_visit("omar", "V001", Some("2024-03-01"), None)
            .unwrap();
        w.visit_add_observation("V001", "Temperature", 38.9, Some("C"), None)
            .unwrap();
    }

    // Second session: reopen and verify.
    {
        let g = MemGraph::open(dir.path()).unwrap();
        let r = GraphReader::new(&g);

        let omar = r.get_patient("OMAR").unwrap().unwrap();
        assert_eq!(omar.key, "Omar");
        assert_eq!(omar.properties.get("age"), Some(&PropValue::Int(52)));

        let symptoms = r.patient_symptoms("omar").unwrap();
        assert_eq!(symptoms.len(), 1);
        assert_eq!(
            symptoms[0].relationship.get("onset_days"),
            Some(&PropValue::Int(3))
        );

        let obs = r.visit_observations("v001").unwrap();
        assert_eq!(obs[0].properties.get("value"), Some(&PropValue::Float(38.9)));
        assert_eq!(keys(r.patient_visits("Omar").unwrap()), vec!["V001"]);
    }
}

#[test]
fn node_attributes_merge_across_sessions() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let g = MemGraph::open(dir.path()).unwrap();
        GraphWriter::new(&g)
            .create_patient("Jane", Some(30), None)
            .unwrap();
    }
    {
        let g = MemGraph::open(dir.path()).unwrap();
        GraphWriter::new(&g)
            .create_patient("jane", None, Some("F"))
            .unwrap();
    }

    let g = MemGraph::open(dir.path()).unwrap();
    assert_eq!(g.node_count(), 1);
    let jane = GraphReader::new(&g).get_patient("Jane").unwrap().unwrap();
    assert_eq!(jane.properties.get("age"), Some(&PropValue::Int(30)));
    assert_eq!(
        jane.properties.get("gender"),
        Some(&PropValue::Str("F".into()))
    );
}

#[test]
fn relationship_attributes_are_last_write_wins_after_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let g = MemGraph::open(dir.path()).unwrap();
        let w = GraphWriter::new(&g);
        w.disease_add_treatment("Asthma", "Salbutamol", Some("first"), Some(true))
            .unwrap();
        w.disease_add_treatment("asthma", "salbutamol", Some("rescue"), None)
            .unwrap();
    }

    let g = MemGraph::open(dir.path()).unwrap();
    assert_eq!(g.edge_count(), 1);
    let treatments = GraphReader::new(&g).treatments_for_disease("ASTHMA").unwrap();
    assert_eq!(keys(treatments), vec!["Salbutamol"]);
}

#[test]
fn seeding_on_every_start_does_not_duplicate() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = persistent_config(dir.path());
    let expected_edges = SeedPack::bundled().unwrap().fact_count();

    let nodes_first = {
        let g = config.open_store().unwrap();
        assert!(g.is_persistent());
        assert_eq!(g.edge_count(), expected_edges);
        g.node_count()
    };

    let g = config.open_store().unwrap();
    assert_eq!(g.node_count(), nodes_first);
    assert_eq!(g.edge_count(), expected_edges);

    let diseases = keys(GraphReader::new(&g).diseases_for_symptom("fever").unwrap());
    assert_eq!(diseases, vec!["Influenza", "COVID-19", "Pneumonia"]);
}

#[test]
fn edits_to_seeded_relationships_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = persistent_config(dir.path());

    {
        let g = config.open_store().unwrap();
        GraphWriter::new(&g)
            .disease_add_treatment("Influenza", "Oseltamivir", Some("second"), Some(false))
            .unwrap();
    }

    let g = config.open_store().unwrap();
    let hops = g
        .neighbors(
            &NodeKey::new(NodeLabel::Disease, "influenza").unwrap(),
            RelationType::TreatedBy,
            Direction::Outgoing,
        )
        .unwrap();
    let oseltamivir = hops
        .iter()
        .find(|h| h.node.key == "Oseltamivir")
        .unwrap();
    assert_eq!(
        oseltamivir.relationship.get("line"),
        Some(&PropValue::Str("second".into()))
    );
    assert_eq!(
        oseltamivir.relationship.get("recommended"),
        Some(&PropValue::Bool(false))
    );
}

#[test]
fn traversal_order_is_stable_across_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let before = {
        let g = MemGraph::open(dir.path()).unwrap();
        let w = GraphWriter::new(&g);
        for test in ["PCR", "Antigen", "Chest CT"] {
            w.test_used_for_diagnosis(test, "COVID-19").unwrap();
        }
        keys(GraphReader::new(&g).tests_for_disease("covid-19").unwrap())
    };

    let g = MemGraph::open(dir.path()).unwrap();
    let after = keys(GraphReader::new(&g).tests_for_disease("covid-19").unwrap());
    assert_eq!(before, vec!["PCR", "Antigen", "Chest CT"]);
    assert_eq!(before, after);
}
