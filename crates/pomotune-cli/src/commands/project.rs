use clap::Subcommand;
use pomotune_core::Project;
use serde::Serialize;

use super::print_json;
use crate::host::Host;

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project
    Create {
        /// Project name
        name: String,
        /// Emoji shown next to the name
        #[arg(long)]
        emoji: Option<String>,
    },
    /// List projects
    List,
    /// Delete a project and its sessions
    Delete {
        /// Project ID
        id: String,
    },
    /// Attribute new sessions to a project
    Switch {
        /// Project ID
        id: String,
    },
}

#[derive(Serialize)]
struct ProjectRow<'a> {
    #[serde(flatten)]
    project: &'a Project,
    current: bool,
}

pub fn run(action: ProjectAction) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open()?;
    match action {
        ProjectAction::Create { name, emoji } => {
            let project = host.db.create_project(&name, emoji.as_deref())?;
            print_json(&project)?;
        }
        ProjectAction::List => {
            let current = host.db.current_project()?;
            let projects = host.db.list_projects()?;
            let rows: Vec<_> = projects
                .iter()
                .map(|project| ProjectRow {
                    current: current.as_deref() == Some(project.id.as_str()),
                    project,
                })
                .collect();
            print_json(&rows)?;
        }
        ProjectAction::Delete { id } => {
            let removed = host.db.delete_project(&id)?;
            eprintln!("Deleted project {id} ({removed} sessions removed)");
        }
        ProjectAction::Switch { id } => {
            if host.db.get_project(&id)?.is_none() {
                return Err(format!("unknown project: {id}").into());
            }
            // The engine still attributes an in-progress phase to the old
            // project, so it sees the switch before the store does.
            let mut engine = host.engine()?;
            engine.restore();
            let event = engine.switch_project(Some(id.clone()));
            host.db.set_current_project(Some(&id))?;
            if let Some(event) = event {
                print_json(&event)?;
            }
            for logged in engine.drain_events() {
                print_json(&logged)?;
            }
        }
    }
    Ok(())
}
