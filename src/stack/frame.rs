use crate::ir::{Ir, NodeId, Symbol};
use crate::state::{State, Variable};

use super::instruction::Instruction;
use super::sub_frame::{SubFrameArena, SubFrameId};

/// One function activation: an ordered path of sub-frames, innermost last.
pub struct Frame {
    owner: NodeId,
    path: Vec<SubFrameId>,
    current_instruction: Option<Instruction>,
}

impl Frame {
    pub fn new(owner: NodeId, base: SubFrameId) -> Self {
        Frame {
            owner,
            path: vec![base],
            current_instruction: None,
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn path(&self) -> &[SubFrameId] {
        &self.path
    }

    pub fn current(&self) -> Option<SubFrameId> {
        self.path.last().copied()
    }

    pub fn push(&mut self, id: SubFrameId) {
        self.path.push(id);
    }

    pub fn pop(&mut self) -> Option<SubFrameId> {
        self.path.pop()
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn has_no_sub_frames(&self) -> bool {
        self.path.is_empty()
    }

    pub fn set_current_instruction(&mut self, instruction: Instruction) {
        self.current_instruction = Some(instruction);
    }

    /// Innermost variable declared for `symbol`, bound or not
    pub fn find_variable<'a>(&self, arena: &'a SubFrameArena, symbol: Symbol) -> Option<&'a Variable> {
        self.path
            .iter()
            .rev()
            .filter_map(|id| arena.get(*id))
            .find_map(|sub_frame| sub_frame.find_variable(symbol))
    }

    /// Innermost bound value of `symbol`. Unbound declarations are skipped.
    pub fn load_state(&self, arena: &SubFrameArena, symbol: Symbol) -> Option<State> {
        self.path
            .iter()
            .rev()
            .filter_map(|id| arena.get(*id))
            .filter_map(|sub_frame| sub_frame.find_variable(symbol))
            .map(Variable::state)
            .find(|state| !state.is_unknown())
    }

    /// Nearest sub-frame, innermost first, that logs writes.
    pub fn history_holder(&self, arena: &SubFrameArena) -> Option<SubFrameId> {
        self.path
            .iter()
            .rev()
            .copied()
            .find(|id| arena.get(*id).is_some_and(|s| s.has_history()))
    }

    /// All variables of the frame, outermost declaration first
    pub fn variables(&self, arena: &SubFrameArena) -> Vec<Variable> {
        self.path
            .iter()
            .filter_map(|id| arena.get(*id))
            .flat_map(|sub_frame| sub_frame.variables().iter().cloned())
            .collect()
    }

    /// Diagnostic line of the form `at <owner>(line N)`
    pub fn describe(&self, ir: &Ir) -> String {
        let line = self
            .current_instruction
            .and_then(|i| i.node())
            .and_then(|node| ir.node(node))
            .and_then(|node| node.line)
            .or_else(|| ir.node(self.owner).and_then(|node| node.line));
        let name = ir.display_name(self.owner);
        match line {
            Some(line) => format!("at {}(line {})", name, line),
            None => format!("at {}({})", name, self.owner),
        }
    }
}
