//! Demo command implementation.
//!
//! Builds two vertices and the segment between them, puts topology on all
//! three, then destroys one vertex and walks the history back and forth,
//! printing which topology is associated with what after every step.

use super::dump::{Format, ModelDump};
use crate::error::CliResult;
use cadledger_core::{Domain, Point3, Session};
use tracing::info;

/// Topology names checked after each step.
const TOPOLOGY: [&str; 3] = ["Vtx0000", "Vtx0001", "Edg0000"];

/// Runs the demo command.
pub fn run() -> CliResult<()> {
    let session = Session::open_default()?;
    let mut recorder = session.recorder();
    info!(session = %session.id(), "demo session opened");

    build(&session)?;
    show(&session, "model built");

    let report = session.geometry().destroy(&["Pt0000"], false)?;
    println!("> {}", report.description);
    show(&session, "after destroy");

    if let Some(report) = session.undo()? {
        println!("> undo {}", report.description);
    }
    show(&session, "after undo");

    if let Some(report) = session.redo()? {
        println!("> redo {}", report.description);
    }
    show(&session, "after redo");

    recorder.drain();
    println!("Audit trail:");
    for line in recorder.lines() {
        println!("  {line}");
    }
    println!();
    ModelDump::capture(&session).print(Format::Text)?;
    Ok(())
}

/// Builds the model: `Pt0000`, `Pt0001`, `Crv0000` and their topology.
pub fn build(session: &Session) -> CliResult<()> {
    let geometry = session.geometry();
    let topology = session.topology();
    for report in [
        geometry.create_vertex(Point3::ORIGIN)?,
        geometry.create_vertex(Point3::new(1.0, 0.0, 0.0))?,
        geometry.create_segment("Pt0000", "Pt0001")?,
        topology.create_vertex(Some("Pt0000"))?,
        topology.create_vertex(Some("Pt0001"))?,
        topology.create_edge(&["Vtx0000", "Vtx0001"], Some("Crv0000"))?,
    ] {
        println!("> {}", report.description);
    }
    Ok(())
}

/// Association of each demo topology entity, `None` when unassociated.
pub fn associations(session: &Session) -> Vec<(&'static str, Option<String>)> {
    let dump = ModelDump::capture(session);
    TOPOLOGY
        .iter()
        .map(|name| {
            let link = dump
                .get(Domain::Topology, name)
                .and_then(|entity| entity.geometry.clone());
            (*name, link)
        })
        .collect()
}

fn show(session: &Session, title: &str) {
    println!("  {title}:");
    for (name, link) in associations(session) {
        match link {
            Some(geometry) => println!("    {name} -> {geometry}"),
            None => println!("    {name} -> (none)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(pairs: &[(&'static str, Option<&str>)]) -> Vec<(&'static str, Option<String>)> {
        pairs
            .iter()
            .map(|(name, link)| (*name, link.map(str::to_string)))
            .collect()
    }

    #[test]
    fn destroy_undo_redo_associations() {
        let session = Session::open_default().unwrap();
        build(&session).unwrap();
        let built = links(&[
            ("Vtx0000", Some("Pt0000")),
            ("Vtx0001", Some("Pt0001")),
            ("Edg0000", Some("Crv0000")),
        ]);
        assert_eq!(associations(&session), built);

        session.geometry().destroy(&["Pt0000"], false).unwrap();
        let destroyed = links(&[
            ("Vtx0000", None),
            ("Vtx0001", Some("Pt0001")),
            ("Edg0000", None),
        ]);
        assert_eq!(associations(&session), destroyed);

        session.undo().unwrap().unwrap();
        assert_eq!(associations(&session), built);

        session.redo().unwrap().unwrap();
        assert_eq!(associations(&session), destroyed);
    }

    #[test]
    fn demo_runs() {
        run().unwrap();
    }
}
