//! End-to-end tests of the editing engine.

use cadledger_core::{
    Associate, ChangeKind, ChangeStatus, CompositeCommand, CopyGeometry, CoreError,
    DestroyGeometry, Dimension, Domain, EntityHandle, LeafCommand, Point3, Session, Transform,
    TransformGeometry,
};
use cadledger_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn p(x: f64, y: f64, z: f64) -> Point3 {
    Point3::new(x, y, z)
}

// associativity

#[test]
fn destroying_a_vertex_clears_dependent_associations() {
    with_session(|session| {
        let names = scenarios::segment_with_edge(session);
        let report = history::check_round_trip(session, |s| {
            s.geometry().destroy(&[names.a], false)
        })
        .expect("destroy commits");
        assert!(report.description.starts_with("destroy Pt0000"));
        assert!(report.description.contains("clear association of"));

        let digest = WorldDigest::of_session(session);
        assert!(digest.get(Domain::Geometry, names.a).is_none());
        assert!(digest.get(Domain::Geometry, names.ab).is_none());
        assert!(digest.get(Domain::Geometry, names.b).is_some());
        assert_eq!(digest.get(Domain::Topology, names.edge).unwrap().link, None);
        assert_eq!(digest.get(Domain::Topology, names.va).unwrap().link, None);
        assert_eq!(
            digest.get(Domain::Topology, names.vb).unwrap().link.as_deref(),
            Some(names.b)
        );
        associativity::check_no_links_to(session, &[names.a, names.ab]);
    });
}

#[test]
fn destroying_with_topology_takes_dependents_along() {
    with_session(|session| {
        let names = scenarios::segment_with_edge(session);
        history::check_round_trip(session, |s| {
            s.geometry().destroy_with_topology(&[names.a], false)
        })
        .expect("destroy commits");

        let digest = WorldDigest::of_session(session);
        let topology: Vec<&str> = digest.topology.keys().map(String::as_str).collect();
        assert_eq!(topology, [names.vb]);
        assert!(digest.get(Domain::Topology, names.vb).unwrap().incident.is_empty());
    });
}

#[test]
fn undoing_the_destroy_restores_everything() {
    with_session(|session| {
        let names = scenarios::segment_with_edge(session);
        let before = WorldDigest::of_session(session);
        session.geometry().destroy(&[names.a], false).unwrap();
        session.undo().unwrap().unwrap();

        assert_same_world(&before, &WorldDigest::of_session(session));
        let edge = before.get(Domain::Topology, names.edge).unwrap();
        assert_eq!(edge.link.as_deref(), Some(names.ab));
    });
}

#[test]
fn transforms_move_dependents_in_lockstep() {
    with_session(|session| {
        let names = scenarios::segment_with_edge(session);
        history::check_round_trip(session, |s| {
            s.geometry().translate(&[names.ab], p(0.0, 0.0, 2.0))
        })
        .expect("translate commits");

        let digest = WorldDigest::of_session(session);
        let curve = digest.get(Domain::Geometry, names.ab).unwrap();
        let edge = digest.get(Domain::Topology, names.edge).unwrap();
        assert_eq!(edge.points, curve.points);
        assert!(curve.points.iter().all(|q| q.z == 2.0));
    });
}

#[test]
fn copies_carry_a_copy_of_the_topology() {
    with_session(|session| {
        let names = scenarios::segment_with_edge(session);
        history::check_round_trip(session, |s| s.geometry().copy(&[names.ab]))
            .expect("copy commits");

        let digest = WorldDigest::of_session(session);
        assert_eq!(digest.geometry.len(), 6);
        assert_eq!(digest.topology.len(), 6);

        let copy = digest
            .topology
            .values()
            .find(|e| e.name.starts_with("Edg") && e.name != names.edge)
            .expect("edge was duplicated");
        let link = copy.link.as_deref().expect("copy is associated");
        assert!(link.starts_with("Crv") && link != names.ab);
        assert_eq!(copy.incident.len(), 2);
        assert!(!copy.incident.contains(names.va) && !copy.incident.contains(names.vb));
        structure::check_world(&session.world());
    });
}

#[test]
fn split_moves_the_association_to_a_piece() {
    with_session(|session| {
        let names = scenarios::segment_with_edge(session);
        let report = history::check_round_trip(session, |s| s.geometry().split(names.ab, 2))
            .expect("split commits");
        assert!(report.description.starts_with("split Crv0000 in 2"));

        let digest = WorldDigest::of_session(session);
        let link = digest
            .get(Domain::Topology, names.edge)
            .unwrap()
            .link
            .clone()
            .expect("edge is reassociated");
        assert!(["Crv0001", "Crv0002"].contains(&link.as_str()));
        structure::check_world(&session.world());
    });
}

#[test]
fn whole_model_transform_moves_both_domains() {
    with_session(|session| {
        let names = scenarios::segment_with_edge(session);
        history::check_round_trip(session, |s| {
            s.transform_all(Transform::Scale {
                center: Point3::ORIGIN,
                factor: 3.0,
            })
        })
        .expect("transform commits");

        let digest = WorldDigest::of_session(session);
        assert_eq!(
            digest.get(Domain::Geometry, names.b).unwrap().points,
            [p(3.0, 0.0, 0.0)]
        );
        assert_eq!(
            digest.get(Domain::Topology, names.vb).unwrap().points,
            [p(3.0, 0.0, 0.0)]
        );
    });
}

// atomicity

#[test]
fn composite_failure_at_any_step_changes_nothing() {
    for failing in 0..4 {
        let test = TestSession::new();
        test.geometry().create_vertex(Point3::ORIGIN).unwrap();
        let before = WorldDigest::of_session(&test);

        let children = (0..4)
            .map(|i| {
                let point = p(f64::from(i) + 1.0, 0.0, 0.0);
                if i == failing {
                    LeafCommand::boxed(FailingStep::failing(point))
                } else {
                    LeafCommand::boxed(FailingStep::ok(point))
                }
            })
            .collect();
        let err = test
            .submit(Box::new(CompositeCommand::new(children)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));

        assert_same_world(&before, &WorldDigest::of_session(&test));
        assert_eq!(test.manager().undo_len(), 1);
        assert_eq!(test.stats().failed, 1);

        // names handed out by the failed command are given back
        let report = test.geometry().create_vertex(p(5.0, 0.0, 0.0)).unwrap();
        assert_eq!(report.description, "create vertex Pt0001 at (5, 0, 0)");
    }
}

#[test]
fn composite_success_links_steps() {
    with_session(|session| {
        let children = (0..3)
            .map(|i| LeafCommand::boxed(FailingStep::ok(p(f64::from(i), 0.0, 0.0))))
            .collect();
        let report = session
            .submit(Box::new(CompositeCommand::new(children)))
            .unwrap();
        assert_eq!(report.description, "step Pt0000; step Pt0001; step Pt0002");

        let digest = WorldDigest::of_session(session);
        let last = digest.get(Domain::Geometry, "Pt0002").unwrap();
        assert_eq!(
            last.incident,
            BTreeSet::from(["Pt0000".to_string(), "Pt0001".to_string()])
        );
    });
}

#[test]
fn kernel_failure_rolls_back() {
    let test = TestSession::with_kernel(FaultyKernel::failing_on("segment"));
    test.geometry().create_vertex(Point3::ORIGIN).unwrap();
    test.geometry().create_vertex(p(1.0, 0.0, 0.0)).unwrap();
    let before = WorldDigest::of_session(&test);

    let err = test.geometry().create_segment("Pt0000", "Pt0001").unwrap_err();
    assert!(matches!(err, CoreError::Kernel { .. }));
    assert_same_world(&before, &WorldDigest::of_session(&test));
    assert_eq!(test.undo_description().as_deref(), Some("create vertex Pt0001 at (1, 0, 0)"));

    let report = test.geometry().create_vertex(p(2.0, 0.0, 0.0)).unwrap();
    assert_eq!(report.description, "create vertex Pt0002 at (2, 0, 0)");
}

// history

#[test]
fn names_are_not_reused_after_undo() {
    with_session(|session| {
        let first = session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        let stale = first.output.created[0];
        session.undo().unwrap().unwrap();

        let second = session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        assert_eq!(second.description, "create vertex Pt0001 at (0, 0, 0)");

        // the undone command left the redo stack, releasing its vertex
        let err = session.world().entity(stale).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(session.stats().released, 1);
    });
}

#[test]
fn new_command_invalidates_redo() {
    with_session(|session| {
        session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        session.geometry().create_vertex(p(1.0, 0.0, 0.0)).unwrap();
        session.undo().unwrap().unwrap();
        assert!(session.can_redo());

        session.geometry().create_vertex(p(2.0, 0.0, 0.0)).unwrap();
        assert!(!session.can_redo());
        assert!(session.redo().unwrap().is_none());
        assert_eq!(
            session.live_names(Domain::Geometry, Dimension::D0),
            ["Pt0000", "Pt0002"]
        );
    });
}

#[test]
fn eviction_releases_destroyed_entities() {
    let test = TestSession::with_history_limit(1);
    let created = test.geometry().create_vertex(Point3::ORIGIN).unwrap();
    let vertex = created.output.created[0];
    test.geometry().destroy(&["Pt0000"], false).unwrap();
    assert!(test.world().entity(vertex).is_ok());

    test.geometry().create_vertex(p(1.0, 0.0, 0.0)).unwrap();
    assert_eq!(test.manager().undo_len(), 1);
    let stats = test.stats();
    assert_eq!(stats.evicted, 2);
    assert_eq!(stats.released, 1);
    assert!(test.world().entity(vertex).unwrap_err().is_internal());

    // the remaining command still undoes
    test.undo().unwrap().unwrap();
    assert!(!test.can_undo());
}

#[test]
fn clearing_history_releases_what_it_owns() {
    with_session(|session| {
        session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        session.geometry().destroy(&["Pt0000"], false).unwrap();
        assert_eq!(session.clear_history(), 1);
        assert!(!session.can_undo());
        assert!(session.undo().unwrap().is_none());
    });
}

#[test]
fn undo_and_redo_describe_the_command() {
    with_session(|session| {
        session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        assert_eq!(
            session.undo_description().as_deref(),
            Some("create vertex Pt0000 at (0, 0, 0)")
        );
        let undone = session.undo().unwrap().unwrap();
        assert_eq!(undone.description, "create vertex Pt0000 at (0, 0, 0)");
        assert_eq!(session.redo_description(), Some(undone.description));
        assert!(session.undo_description().is_none());
    });
}

#[test]
fn revisions_advance_on_every_transition() {
    with_session(|session| {
        let created = session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        let undone = session.undo().unwrap().unwrap();
        let redone = session.redo().unwrap().unwrap();
        assert_eq!(created.id, undone.id);
        assert_eq!(undone.id, redone.id);
        assert!(created.revision < undone.revision && undone.revision < redone.revision);
    });
}

// observers

#[test]
fn feed_reports_inverse_statuses_on_undo() {
    with_session(|session| {
        let events = session.subscribe();
        session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        session.undo().unwrap().unwrap();
        session.redo().unwrap().unwrap();

        let received: Vec<_> = events.try_iter().collect();
        let kinds: Vec<ChangeKind> = received.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [ChangeKind::Committed, ChangeKind::Undone, ChangeKind::Redone]
        );
        let statuses: Vec<ChangeStatus> = received
            .iter()
            .map(|e| {
                let change = e.changes.iter().find(|c| c.name == "Pt0000").unwrap();
                change.status
            })
            .collect();
        assert_eq!(
            statuses,
            [ChangeStatus::Created, ChangeStatus::Deleted, ChangeStatus::Created]
        );
        assert!(received.windows(2).all(|w| w[0].sequence < w[1].sequence));
    });
}

#[test]
fn recorder_produces_a_replayable_trail() {
    with_session(|session| {
        let mut recorder = session.recorder();
        session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        session.undo().unwrap().unwrap();
        session.redo().unwrap().unwrap();
        let _ = session.geometry().copy(&["Pt0042"]);

        assert_eq!(recorder.drain(), 3);
        assert_eq!(
            recorder.lines(),
            ["create vertex Pt0000 at (0, 0, 0)", "undo", "redo"]
        );
    });
}

// names

#[test]
fn shifting_id_replays_names_into_a_populated_session() {
    with_session(|session| {
        for x in 0..3 {
            session.geometry().create_vertex(p(f64::from(x), 0.0, 0.0)).unwrap();
        }
        session.set_shifting_id(true);
        assert!(session.is_shifting_id());

        // a script recorded against an empty session
        session.geometry().create_vertex(p(0.0, 5.0, 0.0)).unwrap();
        session.geometry().create_vertex(p(1.0, 5.0, 0.0)).unwrap();
        let report = session.geometry().create_segment("Pt0000", "Pt0001").unwrap();
        assert_eq!(
            session.names_of(&report.output.created),
            ["Crv0000".to_string()]
        );
        let digest = WorldDigest::of_session(session);
        assert_eq!(
            digest.get(Domain::Geometry, "Crv0000").unwrap().incident,
            BTreeSet::from(["Pt0003".to_string(), "Pt0004".to_string()])
        );

        session.register_alias("Pt0099", "Pt0001");
        let aliased = session.resolve(Domain::Geometry, "Pt0099").unwrap();
        session.set_shifting_id(false);
        assert_eq!(session.resolve(Domain::Geometry, "Pt0001").unwrap(), aliased);
    });
}

#[test]
fn lookups_distinguish_missing_from_destroyed() {
    with_session(|session| {
        session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        session.geometry().destroy(&["Pt0000"], false).unwrap();
        assert!(matches!(
            session.resolve(Domain::Geometry, "Pt0000"),
            Err(CoreError::DestroyedEntity { .. })
        ));
        assert!(matches!(
            session.resolve(Domain::Geometry, "Pt0001"),
            Err(CoreError::NotFound { .. })
        ));
    });
}

// execution modes

fn grid(session: &Session) {
    for i in 0..4 {
        session.geometry().create_vertex(p(f64::from(i), 0.0, 0.0)).unwrap();
    }
}

fn vertex_handles(session: &Session) -> Vec<EntityHandle> {
    session
        .live_names(Domain::Geometry, Dimension::D0)
        .iter()
        .map(|name| session.resolve(Domain::Geometry, name).unwrap())
        .collect()
}

#[test]
fn pooled_batches_match_sequential_execution() {
    let mut digests = Vec::new();
    with_each_mode(|session, _mode| {
        grid(session);
        let commands = vertex_handles(session)
            .into_iter()
            .map(|h| LeafCommand::boxed(CopyGeometry::new(vec![h])))
            .collect();
        let results = session.submit_batch(commands);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(session.manager().undo_len(), 8);
        digests.push(WorldDigest::of_session(session));
    });
    assert_same_world(&digests[0], &digests[1]);
    assert_eq!(digests[0].geometry.len(), 8);
}

#[test]
fn overlapping_batches_see_earlier_results() {
    with_each_mode(|session, mode| {
        grid(session);
        let target = vertex_handles(session)[0];
        let translate = Transform::Translate {
            vector: p(0.0, 1.0, 0.0),
        };
        let commands = (0..2)
            .map(|_| LeafCommand::boxed(TransformGeometry::new(vec![target], translate)))
            .collect();
        let results = session.submit_batch(commands);
        assert!(results.iter().all(Result::is_ok), "{mode:?}");

        let digest = WorldDigest::of_session(session);
        assert_eq!(
            digest.get(Domain::Geometry, "Pt0000").unwrap().points,
            [p(0.0, 2.0, 0.0)],
            "{mode:?}"
        );
    });
}

#[test]
fn batch_failures_are_independent() {
    with_each_mode(|session, _mode| {
        grid(session);
        let handles = vertex_handles(session);
        session.geometry().destroy(&["Pt0001"], false).unwrap();
        let commands = handles
            .iter()
            .map(|h| LeafCommand::boxed(CopyGeometry::new(vec![*h])))
            .collect();
        let results = session.submit_batch(commands);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert!(matches!(results[1], Err(CoreError::DestroyedEntity { .. })));
    });
}

#[test]
fn batch_guards_each_command_after_the_ones_before_it() {
    with_each_mode(|session, mode| {
        session.geometry().create_vertex(Point3::ORIGIN).unwrap();
        session.geometry().create_vertex(p(1.0, 0.0, 0.0)).unwrap();
        session.geometry().create_segment("Pt0000", "Pt0001").unwrap();
        session.topology().create_edge(&[] as &[&str], None).unwrap();
        let edge = session.resolve(Domain::Topology, "Edg0000").unwrap();
        let curve = session.resolve(Domain::Geometry, "Crv0000").unwrap();

        // the edge only references the curve once the first command ran
        let commands = vec![
            LeafCommand::boxed(Associate::new(vec![edge], Some(curve))),
            LeafCommand::boxed(DestroyGeometry::new(vec![curve], false)),
        ];
        let results = session.submit_batch(commands);
        assert!(results.iter().all(Result::is_ok), "{mode:?}");
        let destroy = results[1].as_ref().unwrap();
        assert!(destroy.description.starts_with("destroy Crv0000"), "{mode:?}");
        assert!(
            destroy.description.ends_with("clear association of Edg0000"),
            "{mode:?}"
        );

        associativity::check_no_links_to(session, &["Crv0000"]);
        structure::check_associations(&session.world());

        session.undo().unwrap().unwrap();
        let digest = WorldDigest::of_session(session);
        assert_eq!(
            digest.get(Domain::Topology, "Edg0000").unwrap().link.as_deref(),
            Some("Crv0000")
        );
    });
}

#[test]
fn submitted_composite_clears_links_it_breaks() {
    with_session(|session| {
        let names = scenarios::segment_with_edge(session);
        let curve = session.resolve(Domain::Geometry, names.ab).unwrap();
        let composite = CompositeCommand::new(vec![LeafCommand::boxed(DestroyGeometry::new(
            vec![curve],
            false,
        ))])
        .with_label("remove segment");

        let report = history::check_round_trip(session, |s| s.submit(Box::new(composite)))
            .expect("composite commits");
        assert_eq!(report.description, "remove segment");
        associativity::check_no_links_to(session, &[names.ab]);
        let digest = WorldDigest::of_session(session);
        assert_eq!(digest.get(Domain::Topology, names.edge).unwrap().link, None);
    });
}

#[test]
fn pooled_session_round_trips() {
    let test = TestSession::pooled();
    let names = scenarios::segment_with_edge(&test);
    history::check_round_trip(&test, |s| s.geometry().split(names.ab, 3)).expect("split commits");
    history::check_round_trip(&test, |s| s.geometry().extrude(&[names.b], p(0.0, 0.0, 1.0)))
        .expect("extrude commits");
    structure::check_world(&test.world());
}

#[test]
fn concurrent_readers_never_see_partial_commands() {
    let session = std::sync::Arc::new(TestSession::pooled().session);
    let config = StressConfig {
        operations: 200,
        threads: 3,
    };
    let result = stress_concurrent_readers(session, &config);
    assert_eq!(result.failed_ops, 0);
}

// properties

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn history_replays_every_state(steps in build_sequence_strategy(1, 20)) {
        let test = TestSession::with_history_limit(usize::MAX);
        let mut trail = vec![WorldDigest::of_session(&test)];
        for step in &steps {
            if let StepOutcome::Committed(_) = step.apply(&test) {
                trail.push(WorldDigest::of_session(&test));
            }
            structure::check_world(&test.world());
        }
        history::check_unwind(&test, &trail);
    }

    #[test]
    fn undo_then_redo_is_identity(steps in edit_sequence_strategy(1, 24)) {
        let test = TestSession::new();
        for step in &steps {
            step.apply(&test);
        }
        let now = WorldDigest::of_session(&test);
        if test.undo().unwrap().is_some() {
            test.redo().unwrap().unwrap();
        }
        prop_assert_eq!(now, WorldDigest::of_session(&test));
    }

    #[test]
    fn created_names_are_never_repeated(steps in build_sequence_strategy(1, 30)) {
        let test = TestSession::new();
        let mut seen = BTreeSet::new();
        for step in &steps {
            if let StepOutcome::Committed(report) = step.apply(&test) {
                for name in test.names_of(&report.output.created) {
                    prop_assert!(seen.insert(name.clone()), "{} handed out twice", name);
                }
            }
        }
    }
}
