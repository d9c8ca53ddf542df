use std::fmt;

use crate::ir::{NodeId, Symbol};

/// A unit of pending work in a sub-frame's queue.
///
/// Every expression leaves exactly one state on the data stack once its
/// `Compound` unfolding has fully run (statements leave unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Execute the node assuming its operands are already on the data stack
    Simple(NodeId),
    /// Unfold the node into the instructions that evaluate its operands first
    Compound(NodeId),
    /// Pop and drop one state
    Discard,
    /// The condition of branch `index` of a `when` is on the data stack
    Branch { node: NodeId, index: usize },
    /// Try one catch clause against the thrown value on top of the data stack
    Catch(NodeId),
    /// No catch clause of this try matched; keep unwinding
    Rethrow(NodeId),
    /// A finally block ran on the throw path; the thrown value is on top again
    PropagateThrow,
    /// Pop a default argument and bind it to the parameter
    BindParameter(Symbol),
}

impl Instruction {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Instruction::Simple(node)
            | Instruction::Compound(node)
            | Instruction::Branch { node, .. }
            | Instruction::Catch(node)
            | Instruction::Rethrow(node) => Some(*node),
            Instruction::Discard | Instruction::PropagateThrow | Instruction::BindParameter(_) => {
                None
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Simple(node) => write!(f, "simple {}", node),
            Instruction::Compound(node) => write!(f, "compound {}", node),
            Instruction::Discard => write!(f, "discard"),
            Instruction::Branch { node, index } => write!(f, "branch {}[{}]", node, index),
            Instruction::Catch(node) => write!(f, "catch {}", node),
            Instruction::Rethrow(node) => write!(f, "rethrow {}", node),
            Instruction::PropagateThrow => write!(f, "propagate throw"),
            Instruction::BindParameter(param) => write!(f, "bind {}", param),
        }
    }
}
