//! Cross-reference checks between declarations.

use std::collections::{BTreeMap, BTreeSet};

use plan_model::{Chip, ProcessDecl, Project};

use crate::LayoutError;

/// Checks names and references before anything is placed.
///
/// # Errors
/// [`LayoutError::Duplicate`], [`LayoutError::UnknownReference`] or
/// [`LayoutError::VectorRebound`].
pub fn check(chip: &Chip, project: &Project) -> Result<(), LayoutError> {
    let mut processes = BTreeSet::new();
    for p in &project.processes {
        if !processes.insert(p.name.as_str()) {
            return Err(LayoutError::Duplicate {
                owner: project.name.clone(),
                name: p.name.clone(),
            });
        }
        unique_objects(p)?;
    }

    let mut bound: BTreeMap<&str, &str> = BTreeMap::new();
    for p in &project.processes {
        let unknown = |what, name: &str| LayoutError::UnknownReference {
            owner: p.name.clone(),
            what,
            name: name.to_owned(),
        };

        for port in &p.ports {
            let (_, target) = project
                .process(&port.process)
                .ok_or_else(|| unknown("process", &port.process))?;
            if target.invocation(&port.invocation).is_none() {
                return Err(unknown("invocation", &port.invocation));
            }
        }

        for send in &p.sends {
            let (_, target) = project
                .process(&send.process)
                .ok_or_else(|| unknown("process", &send.process))?;
            if target.receive(&send.receive).is_none() {
                return Err(unknown("receive endpoint", &send.receive));
            }
        }

        for v in &p.vectors {
            if chip.vector(&v.name).is_none() {
                return Err(unknown("vector", &v.name));
            }
            if let Some(first) = bound.insert(v.name.as_str(), p.name.as_str()) {
                return Err(LayoutError::VectorRebound {
                    vector: v.name.clone(),
                    first: first.to_owned(),
                    second: p.name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn unique_objects(p: &ProcessDecl) -> Result<(), LayoutError> {
    let names = p
        .threads
        .iter()
        .map(|t| &t.name)
        .chain(p.invocations.iter().map(|i| &i.name))
        .chain(p.ports.iter().map(|x| &x.name))
        .chain(p.receives.iter().map(|x| &x.name))
        .chain(p.sends.iter().map(|x| &x.name))
        .chain(p.vectors.iter().map(|x| &x.name));

    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(LayoutError::Duplicate {
                owner: p.name.clone(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}
