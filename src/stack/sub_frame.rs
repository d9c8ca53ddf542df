//! Lexical regions within a frame
//!
//! Sub-frames are stored in an arena owned by the call stack and addressed by
//! [`SubFrameId`]; frames only keep the ordered path of ids they own.

use std::collections::VecDeque;

use crate::ir::{NodeId, Symbol};
use crate::state::{State, Variable};

use super::history::HistoryLog;
use super::instruction::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubFrameId(u32);

pub struct SubFrame {
    owner: NodeId,
    instructions: VecDeque<Instruction>,
    data: Vec<State>,
    /// Most recent declaration last
    memory: Vec<Variable>,
    history: Option<HistoryLog>,
}

impl SubFrame {
    pub fn new(owner: NodeId) -> Self {
        SubFrame {
            owner,
            instructions: VecDeque::new(),
            data: Vec::new(),
            memory: Vec::new(),
            history: None,
        }
    }

    /// A sub-frame that logs the first write to every location it sees.
    pub fn with_history(owner: NodeId) -> Self {
        SubFrame {
            history: Some(HistoryLog::new()),
            ..SubFrame::new(owner)
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Instructions
    // ═══════════════════════════════════════════════════════════════════════

    pub fn has_no_instructions(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Queue at the front: the instruction added last runs first.
    pub fn push_instruction(&mut self, instruction: Instruction) {
        self.instructions.push_front(instruction);
    }

    pub fn pop_instruction(&mut self) -> Option<Instruction> {
        self.instructions.pop_front()
    }

    /// Clear the queue, returning the instruction that would have run last.
    pub fn drop_instructions(&mut self) -> Option<Instruction> {
        let last = self.instructions.pop_back();
        self.instructions.clear();
        last
    }

    pub fn clear_instructions(&mut self) {
        self.instructions.clear();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Data stack
    // ═══════════════════════════════════════════════════════════════════════

    pub fn push_state(&mut self, state: State) {
        self.data.push(state);
    }

    pub fn pop_state(&mut self) -> Option<State> {
        self.data.pop()
    }

    pub fn peek_state(&self) -> Option<&State> {
        self.data.last()
    }

    pub fn data_height(&self) -> usize {
        self.data.len()
    }

    pub fn truncate_data(&mut self, height: usize) {
        self.data.truncate(height);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Memory
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_variable(&mut self, variable: Variable) {
        self.memory.push(variable);
    }

    pub fn find_variable(&self, symbol: Symbol) -> Option<&Variable> {
        self.memory.iter().rev().find(|v| v.symbol == symbol)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.memory
    }

    // ═══════════════════════════════════════════════════════════════════════
    // History
    // ═══════════════════════════════════════════════════════════════════════

    pub fn has_history(&self) -> bool {
        self.history.is_some()
    }

    pub fn history(&self) -> Option<&HistoryLog> {
        self.history.as_ref()
    }

    pub fn history_mut(&mut self) -> Option<&mut HistoryLog> {
        self.history.as_mut()
    }

    pub fn take_history(&mut self) -> Option<HistoryLog> {
        self.history.take()
    }
}

/// Slot storage for sub-frames with id reuse
#[derive(Default)]
pub struct SubFrameArena {
    slots: Vec<Option<SubFrame>>,
    free: Vec<u32>,
}

impl SubFrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, sub_frame: SubFrame) -> SubFrameId {
        if let Some(index) = self.free.pop()
            && let Some(slot) = self.slots.get_mut(index as usize)
        {
            *slot = Some(sub_frame);
            return SubFrameId(index);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Some(sub_frame));
        SubFrameId(index)
    }

    pub fn release(&mut self, id: SubFrameId) -> Option<SubFrame> {
        let sub_frame = self.slots.get_mut(id.0 as usize)?.take()?;
        self.free.push(id.0);
        Some(sub_frame)
    }

    pub fn get(&self, id: SubFrameId) -> Option<&SubFrame> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: SubFrameId) -> Option<&mut SubFrame> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
