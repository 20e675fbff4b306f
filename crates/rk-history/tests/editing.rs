//! End-to-end editing sessions on the preview kernel.

use std::collections::HashSet;
use std::sync::Arc;

use rk_history::{
    BlockReason, Engine, EngineConfig, ExtrudeDirection, ExtrudeParams, Feature, FeatureId,
    FeatureKind, FeatureMetadata, FilletParams, HistoryError, NodeError, PreviewKernel,
    SketchParams,
};

fn id(s: &str) -> FeatureId {
    FeatureId::from(s)
}

fn extrude(distance: f32) -> FeatureKind {
    FeatureKind::Extrude(ExtrudeParams {
        distance,
        direction: ExtrudeDirection::Positive,
        draft_angle: 0.0,
    })
}

/// S1 -> E1 -> F1, regenerated once
fn part() -> Engine {
    let mut engine = Engine::new(EngineConfig::default(), Arc::new(PreviewKernel::new()));
    engine
        .add_feature(
            Feature::sketch("Profile", SketchParams::rectangle(20.0, 10.0)).with_id("S1"),
            vec![],
            None,
        )
        .unwrap();
    engine
        .add_feature(
            Feature::extrude("Body", 5.0, ExtrudeDirection::Positive).with_id("E1"),
            vec![id("S1")],
            None,
        )
        .unwrap();
    engine
        .add_feature(
            Feature::fillet("Round", vec![0, 1], 1.0).with_id("F1"),
            vec![id("E1")],
            None,
        )
        .unwrap();
    engine.request_regenerate(None).unwrap();
    engine
}

#[test]
fn parameter_edit_regenerates_downstream_only() {
    let mut engine = part();
    let sketch = engine.select(&id("S1")).unwrap();

    engine.update_parameters(&id("E1"), extrude(8.0)).unwrap();
    assert!(engine.select(&id("F1")).is_none());
    assert!(engine.select(&id("S1")).is_some());

    let result = engine.request_regenerate(None).unwrap();
    assert_eq!(result.regenerated, vec![id("E1"), id("F1")]);
    assert_eq!(engine.select(&id("S1")), Some(sketch));

    let (lo, hi) = engine.select(&id("E1")).unwrap().mesh.bounds().unwrap();
    assert!((hi.z - lo.z - 8.0).abs() < 1e-4);
}

#[test]
fn failure_leaves_siblings_alone() {
    let mut engine = part();
    engine
        .add_feature(
            Feature::chamfer("Edge break", vec![2], 0.5).with_id("C1"),
            vec![id("E1")],
            None,
        )
        .unwrap();
    engine
        .add_feature(
            Feature::chamfer("After round", vec![0], 0.2).with_id("C2"),
            vec![id("F1")],
            None,
        )
        .unwrap();
    engine
        .update_parameters(
            &id("F1"),
            FeatureKind::Fillet(FilletParams {
                radius: -1.0,
                edges: vec![0],
            }),
        )
        .unwrap();

    let result = engine.request_regenerate(None).unwrap();
    assert_eq!(result.regenerated, vec![id("C1")]);
    assert!(matches!(
        result.error_for(&id("F1")),
        Some(NodeError::Kernel(_))
    ));
    assert_eq!(
        result.error_for(&id("C2")),
        Some(&NodeError::Blocked {
            upstream: id("F1"),
            reason: BlockReason::Failed,
        })
    );

    // F1 keeps its previous geometry, flagged stale
    let view = engine.view(&id("F1")).unwrap();
    assert!(view.stale);
    assert!(view.artifact.is_some());
    assert!(engine.select(&id("F1")).is_none());

    // Fixing the fillet clears both errors
    engine
        .update_parameters(
            &id("F1"),
            FeatureKind::Fillet(FilletParams {
                radius: 0.5,
                edges: vec![0],
            }),
        )
        .unwrap();
    let result = engine.request_regenerate(None).unwrap();
    assert!(result.is_success());
    assert_eq!(result.regenerated, vec![id("F1"), id("C2")]);
    assert!(engine.view(&id("C2")).unwrap().error.is_none());
}

#[test]
fn structural_errors_have_no_side_effects() {
    let mut engine = part();

    assert_eq!(
        engine.remove_feature(&id("E1")),
        Err(HistoryError::InUse {
            id: id("E1"),
            dependents: vec![id("F1")],
        })
    );
    match engine.set_parents(&id("S1"), vec![id("F1")]) {
        Err(HistoryError::Cycle { path }) => {
            assert_eq!(path, vec![id("S1"), id("F1"), id("E1"), id("S1")]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
    assert!(matches!(
        engine.update_parameters(&id("F1"), extrude(1.0)),
        Err(HistoryError::TypeMismatch { .. })
    ));
    assert!(matches!(
        engine.add_feature(
            Feature::fillet("Orphan", vec![], 1.0),
            vec![id("missing")],
            None
        ),
        Err(HistoryError::FeatureNotFound(_))
    ));

    assert_eq!(engine.store().len(), 3);
    assert!(engine.store().dirty_ids().is_empty());
    assert!(engine.store().parents_of(&id("S1")).unwrap().is_empty());
}

#[test]
fn cascade_removes_dependents_first() {
    let mut engine = part();
    let removed = engine.remove_feature_cascade(&id("E1")).unwrap();
    assert_eq!(removed, vec![id("F1"), id("E1")]);
    assert_eq!(engine.store().ids(), &[id("S1")]);

    let removed = engine.remove_feature(&id("S1")).unwrap();
    assert_eq!(removed.name, "Profile");
    assert!(engine.store().is_empty());
}

#[test]
fn rename_and_metadata_keep_geometry() {
    let mut engine = part();
    let before = engine.select(&id("F1")).unwrap();

    engine.rename_feature(&id("F1"), "Soft edge").unwrap();
    engine
        .set_feature_metadata(
            &id("F1"),
            FeatureMetadata::new("break sharp edges").with_tag("cosmetic"),
        )
        .unwrap();

    assert_eq!(engine.select(&id("F1")), Some(before));
    let feature = &engine.store().get(&id("F1")).unwrap().feature;
    assert_eq!(feature.name, "Soft edge");
    assert_eq!(feature.tags, vec!["cosmetic".to_owned()]);
}

#[test]
fn scoped_regeneration_recomputes_clean_features() {
    let mut engine = part();
    let before = engine.select(&id("E1")).unwrap();

    let scope = HashSet::from([id("E1")]);
    let result = engine.request_regenerate(Some(&scope)).unwrap();
    assert_eq!(result.regenerated, vec![id("E1"), id("F1")]);
    assert_ne!(engine.select(&id("E1")), Some(before));
}

#[test]
fn rollback_hides_later_features() {
    let mut engine = part();
    engine.rollback_to(&id("E1")).unwrap();
    assert!(!engine.view(&id("F1")).unwrap().active);

    // New work lands right after the marker
    let chamfer = engine
        .add_feature(
            Feature::chamfer("Early chamfer", vec![0], 0.5).with_id("C1"),
            vec![id("E1")],
            None,
        )
        .unwrap();
    assert_eq!(engine.store().rollback(), Some(&chamfer));
    assert_eq!(
        engine.store().ids(),
        &[id("S1"), id("E1"), id("C1"), id("F1")]
    );

    engine.update_parameters(&id("E1"), extrude(6.0)).unwrap();
    let result = engine.request_regenerate(None).unwrap();
    assert_eq!(result.regenerated, vec![id("E1"), id("C1")]);
    assert_eq!(result.skipped, vec![id("F1")]);

    engine.rollback_to_end();
    let result = engine.request_regenerate(None).unwrap();
    assert_eq!(result.regenerated, vec![id("F1")]);
}

#[test]
fn suppression_round_trip() {
    let mut engine = part();
    engine.set_suppressed(&id("F1"), true).unwrap();
    let result = engine.request_regenerate(None).unwrap();
    assert_eq!(result.skipped, vec![id("F1")]);
    assert!(engine.view(&id("F1")).unwrap().suppressed);

    engine.set_suppressed(&id("F1"), false).unwrap();
    let result = engine.request_regenerate(None).unwrap();
    assert_eq!(result.regenerated, vec![id("F1")]);
}

#[test]
fn branches_are_independent() {
    let mut engine = part();
    engine.fork_branch("main", "taller").unwrap();
    engine.describe_branch("taller", "try a taller body").unwrap();
    engine.tag_branch("taller", "experiment").unwrap();

    engine.switch_branch("taller").unwrap();
    // Forked features come with their artifacts
    assert!(engine.select(&id("F1")).is_some());
    engine.update_parameters(&id("E1"), extrude(12.0)).unwrap();
    engine.request_regenerate(None).unwrap();
    let taller = engine.select(&id("E1")).unwrap();

    engine.switch_branch("main").unwrap();
    let main = engine.select(&id("E1")).unwrap();
    assert_ne!(main, taller);
    let (lo, hi) = main.mesh.bounds().unwrap();
    assert!((hi.z - lo.z - 5.0).abs() < 1e-4);

    let listed = engine.list_branches();
    assert_eq!(listed.len(), 2);
    let meta = listed.iter().find(|m| m.branch_id == "taller").unwrap();
    assert_eq!(meta.description, "try a taller body");
    assert_eq!(meta.tags, vec!["experiment".to_owned()]);

    engine.delete_branch("taller").unwrap();
    assert_eq!(engine.list_branches().len(), 1);
    assert_eq!(
        engine.fork_branch("ghost", "x"),
        Err(HistoryError::BranchNotFound("ghost".into()))
    );
}

#[test]
fn deleting_on_a_fork_leaves_the_source_branch_alone() {
    let mut engine = part();
    let main_round = engine.select(&id("F1")).unwrap();
    let main_body = engine.select(&id("E1")).unwrap();

    engine.fork_branch("main", "main-copy").unwrap();
    engine.switch_branch("main-copy").unwrap();
    assert_eq!(engine.remove_feature(&id("F1")).unwrap().name, "Round");
    assert_eq!(
        engine.remove_feature_cascade(&id("S1")).unwrap(),
        vec![id("E1"), id("S1")]
    );
    assert!(engine.store().is_empty());

    engine.switch_branch("main").unwrap();
    assert_eq!(engine.store().ids(), &[id("S1"), id("E1"), id("F1")]);
    let round = engine.select(&id("F1")).unwrap();
    assert_eq!(round.id, main_round.id);
    assert_eq!(round, main_round);
    assert_eq!(engine.select(&id("E1")), Some(main_body));

    let result = engine.request_regenerate(None).unwrap();
    assert!(result.attempted.is_empty());
}
