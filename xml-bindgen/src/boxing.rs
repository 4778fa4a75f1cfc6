use crate::model::{Model, Slot};
use std::collections::HashMap;

/// One reference inside one shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeId {
    pub shape: String,
    pub slot: Slot,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

struct Walk<'m> {
    model: &'m Model,
    marks: HashMap<&'m str, Mark>,
    edges: Vec<EdgeId>,
}

impl<'m> Walk<'m> {
    fn visit(&mut self, name: &'m str) {
        let model = self.model;
        let Some(shape) = model.shapes.get(name) else {
            return;
        };
        self.marks.insert(name, Mark::OnPath);
        for (slot, target) in shape.refs() {
            match self.marks.get(target.target.as_str()) {
                Some(Mark::OnPath) => self.edges.push(EdgeId {
                    shape: name.to_owned(),
                    slot,
                }),
                Some(Mark::Done) => {}
                None => self.visit(&target.target),
            }
        }
        self.marks.insert(name, Mark::Done);
    }
}

/// The back-edges of a depth-first walk over the model, shapes and their
/// references taken in declaration order. Removing them leaves the graph
/// acyclic. References to unknown shapes are not followed.
pub fn back_edges(model: &Model) -> Vec<EdgeId> {
    let mut walk = Walk {
        model,
        marks: HashMap::new(),
        edges: vec![],
    };
    for name in model.shapes.keys() {
        if !walk.marks.contains_key(name.as_str()) {
            walk.visit(name);
        }
    }
    walk.edges
}

/// Marks exactly the back-edges of the model as indirect and clears the flag
/// everywhere else, so boxing an already boxed model changes nothing.
pub fn box_cycles(mut model: Model) -> Model {
    for shape in model.shapes.values_mut() {
        let slots: Vec<Slot> = shape.refs().into_iter().map(|(slot, _)| slot).collect();
        for slot in slots {
            if let Some(target) = shape.slot_mut(slot) {
                target.indirect = false;
            }
        }
    }
    for edge in back_edges(&model) {
        if let Some(target) = model.shapes.get_mut(&edge.shape).and_then(|s| s.slot_mut(edge.slot)) {
            tracing::debug!(shape = %edge.shape, slot = ?edge.slot, target = %target.target, "boxing back-edge");
            target.indirect = true;
        }
    }
    model
}
