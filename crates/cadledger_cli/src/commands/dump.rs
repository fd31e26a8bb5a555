//! Model dump shared by `run --dump` and `demo`.

use crate::error::CliError;
use cadledger_core::{Domain, EntityHandle, Point3, Session, StatsSnapshot, World};
use serde::Serialize;
use std::str::FromStr;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl FromStr for Format {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::Format(other.to_string())),
        }
    }
}

/// A live entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDump {
    /// Entity name.
    pub name: String,
    /// Dimension, 0 through 3.
    pub dimension: u8,
    /// Defining points.
    pub points: Vec<Point3>,
    /// Names of adjacent entities.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incident: Vec<String>,
    /// Groups.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Associated geometry, for topology.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
}

/// The live model of a session and its history state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDump {
    /// Live geometry.
    pub geometry: Vec<EntityDump>,
    /// Live topology.
    pub topology: Vec<EntityDump>,
    /// Commands on the undo stack.
    pub undo_depth: usize,
    /// Commands on the redo stack.
    pub redo_depth: usize,
    /// Session counters.
    pub stats: StatsSnapshot,
}

impl ModelDump {
    /// Captures the session's current state.
    pub fn capture(session: &Session) -> Self {
        let (geometry, topology) = {
            let world = session.world();
            (
                entities(&world, Domain::Geometry),
                entities(&world, Domain::Topology),
            )
        };
        Self {
            geometry,
            topology,
            undo_depth: session.manager().undo_len(),
            redo_depth: session.manager().redo_len(),
            stats: session.stats(),
        }
    }

    /// Looks up a live entity by name.
    pub fn get(&self, domain: Domain, name: &str) -> Option<&EntityDump> {
        let entities = match domain {
            Domain::Geometry => &self.geometry,
            Domain::Topology => &self.topology,
        };
        entities.iter().find(|entity| entity.name == name)
    }

    /// Prints the dump in `format`.
    pub fn print(&self, format: Format) -> Result<(), CliError> {
        match format {
            Format::Json => println!("{}", serde_json::to_string_pretty(self)?),
            Format::Text => self.print_text(),
        }
        Ok(())
    }

    fn print_text(&self) {
        for (title, entities) in [("Geometry", &self.geometry), ("Topology", &self.topology)] {
            println!("{title} ({} live)", entities.len());
            for entity in entities {
                print!("  {} [{}]", entity.name, entity.dimension);
                if !entity.incident.is_empty() {
                    print!(" incident: {}", entity.incident.join(", "));
                }
                if !entity.groups.is_empty() {
                    print!(" groups: {}", entity.groups.join(", "));
                }
                if let Some(geometry) = &entity.geometry {
                    print!(" on {geometry}");
                }
                println!();
            }
        }
        println!();
        println!("History: {} undo, {} redo", self.undo_depth, self.redo_depth);
        println!(
            "Commands: {} committed, {} failed, {} undone, {} redone, {} evicted",
            self.stats.committed,
            self.stats.failed,
            self.stats.undone,
            self.stats.redone,
            self.stats.evicted
        );
    }
}

fn entities(world: &World, domain: Domain) -> Vec<EntityDump> {
    let name = |handle: EntityHandle| world.name_of(handle).unwrap_or("?").to_string();
    world
        .store(domain)
        .live_all()
        .map(|(_, entity)| EntityDump {
            name: entity.name().to_string(),
            dimension: entity.dimension().as_u8(),
            points: entity.shape().points.clone(),
            incident: entity.incident().iter().map(|h| name(*h)).collect(),
            groups: entity.groups().iter().cloned().collect(),
            geometry: entity.domain_link().map(name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_str() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert!(matches!(
            "yaml".parse::<Format>().unwrap_err(),
            CliError::Format(_)
        ));
    }

    #[test]
    fn capture_names_links() {
        let session = Session::open_default().unwrap();
        let geometry = session.geometry();
        geometry.create_vertex(Point3::ORIGIN).unwrap();
        geometry.create_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();
        geometry.create_segment("Pt0000", "Pt0001").unwrap();
        session
            .topology()
            .create_edge(&[] as &[&str], Some("Crv0000"))
            .unwrap();

        let dump = ModelDump::capture(&session);
        assert_eq!(dump.geometry.len(), 3);
        assert_eq!(dump.undo_depth, 4);
        let curve = dump.get(Domain::Geometry, "Crv0000").unwrap();
        assert_eq!(curve.incident, ["Pt0000", "Pt0001"]);
        let edge = dump.get(Domain::Topology, "Edg0000").unwrap();
        assert_eq!(edge.geometry.as_deref(), Some("Crv0000"));

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["stats"]["committed"], 4);
    }
}
