//! Mutable, handle-addressed instruction stream of one method body.
//!
//! [`InstructionList`] is a doubly linked list stored in an arena. Every instruction gets an
//! [`InstructionHandle`] when it is inserted and keeps it until it is deleted; handles are
//! never reused, so a stale handle is detected instead of silently pointing at a newer
//! instruction. Branches, switches and exception handlers refer to handles, which is what
//! lets the optimizer rewrite the stream without patching offsets.
//!
//! # Deletion Safety
//!
//! [`InstructionList::delete_range`] refuses to remove an instruction that is still the
//! target of a branch or exception handler outside the deleted range, returning
//! [`crate::Error::DanglingBranchTarget`]. A target inside the range goes away together with
//! everything that refers to it.
//!
//! # Positions
//!
//! Byte offsets are only meaningful after [`InstructionList::recompute_positions`], which
//! lays the stream out, widens `goto`/`jsr` to their 32-bit forms when a displacement no
//! longer fits in 16 bits, and validates every target.
//!
//! # Examples
//!
//! ```rust
//! use classfold::assembly::{ArithmeticOp, Instruction, InstructionList, TypeTag};
//!
//! let mut list = InstructionList::new();
//! let two = list.append(Instruction::int_const(2));
//! let three = list.append(Instruction::int_const(3));
//! let add = list.append(Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Int });
//!
//! list.set(two, Instruction::int_const(5))?;
//! list.delete_range(three, add)?;
//! assert_eq!(list.len(), 1);
//! assert_eq!(list.get(two), Some(&Instruction::int_const(5)));
//! assert!(list.get(three).is_none());
//! # Ok::<(), classfold::Error>(())
//! ```

use std::{collections::HashSet, fmt};

use crate::{
    assembly::{encoder::encoded_size, Instruction},
    Error, Result,
};

/// Stable reference to an instruction inside an [`InstructionList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionHandle(u32);

impl InstructionHandle {
    /// Creates a handle from its arena index.
    #[must_use]
    pub fn new(index: u32) -> Self {
        InstructionHandle(index)
    }

    /// The arena index of this handle.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstructionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A try/catch region expressed in handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First protected instruction
    pub start: InstructionHandle,
    /// First instruction after the protected range, `None` if it runs to the end of the code
    pub end: Option<InstructionHandle>,
    /// Entry of the handler
    pub handler: InstructionHandle,
    /// Constant pool index of the caught class, 0 for `finally`
    pub catch_type: u16,
}

impl ExceptionHandler {
    /// Returns `true` if the region refers to `handle` in any of its fields.
    #[must_use]
    pub fn refers_to(&self, handle: InstructionHandle) -> bool {
        self.start == handle || self.end == Some(handle) || self.handler == handle
    }
}

/// Something that refers to an instruction as a control flow target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Targeter {
    /// A branch, `goto`, `jsr` or switch instruction
    Instruction(InstructionHandle),
    /// An entry of the exception table, by index
    ExceptionHandler(usize),
}

impl fmt::Display for Targeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Targeter::Instruction(handle) => write!(f, "{handle}"),
            Targeter::ExceptionHandler(index) => write!(f, "exception handler #{index}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    instruction: Instruction,
    prev: Option<InstructionHandle>,
    next: Option<InstructionHandle>,
    live: bool,
    position: u32,
    long_form: bool,
}

/// The instruction stream of one method.
#[derive(Debug, Clone, Default)]
pub struct InstructionList {
    nodes: Vec<Node>,
    head: Option<InstructionHandle>,
    tail: Option<InstructionHandle>,
    len: usize,
    handlers: Vec<ExceptionHandler>,
    positions_valid: bool,
}

impl InstructionList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        InstructionList::default()
    }

    /// Builds a list from a sequence of instructions.
    ///
    /// The instruction at index `i` receives `InstructionHandle::new(i)`, so targets inside
    /// `instructions` may already be expressed as indices.
    #[must_use]
    pub fn from_vec(instructions: Vec<Instruction>) -> Self {
        let mut list = InstructionList::new();
        for instruction in instructions {
            list.append(instruction);
        }
        list
    }

    /// Number of live instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list holds no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First instruction.
    #[must_use]
    pub fn head(&self) -> Option<InstructionHandle> {
        self.head
    }

    /// Last instruction.
    #[must_use]
    pub fn tail(&self) -> Option<InstructionHandle> {
        self.tail
    }

    /// Returns `true` if `handle` refers to a live instruction of this list.
    #[must_use]
    pub fn contains(&self, handle: InstructionHandle) -> bool {
        self.node(handle).is_some()
    }

    /// The instruction behind `handle`.
    #[must_use]
    pub fn get(&self, handle: InstructionHandle) -> Option<&Instruction> {
        self.node(handle).map(|node| &node.instruction)
    }

    /// Successor of `handle` in stream order.
    #[must_use]
    pub fn next(&self, handle: InstructionHandle) -> Option<InstructionHandle> {
        self.node(handle).and_then(|node| node.next)
    }

    /// Predecessor of `handle` in stream order.
    #[must_use]
    pub fn prev(&self, handle: InstructionHandle) -> Option<InstructionHandle> {
        self.node(handle).and_then(|node| node.prev)
    }

    /// Iterates over `(handle, instruction)` pairs in stream order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Appends an instruction at the end of the stream.
    pub fn append(&mut self, instruction: Instruction) -> InstructionHandle {
        let handle = self.allocate(instruction, self.tail, None);
        match self.tail {
            Some(tail) => self.nodes[tail.index()].next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        handle
    }

    /// Inserts an instruction directly before `at`.
    ///
    /// Branches to `at` keep pointing at `at`, not at the new instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidHandle`] if `at` is not live.
    pub fn insert_before(
        &mut self,
        at: InstructionHandle,
        instruction: Instruction,
    ) -> Result<InstructionHandle> {
        let prev = self.node(at).ok_or(Error::InvalidHandle(at))?.prev;
        let handle = self.allocate(instruction, prev, Some(at));
        self.nodes[at.index()].prev = Some(handle);
        match prev {
            Some(prev) => self.nodes[prev.index()].next = Some(handle),
            None => self.head = Some(handle),
        }
        Ok(handle)
    }

    /// Inserts an instruction directly after `at`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidHandle`] if `at` is not live.
    pub fn insert_after(
        &mut self,
        at: InstructionHandle,
        instruction: Instruction,
    ) -> Result<InstructionHandle> {
        let next = self.node(at).ok_or(Error::InvalidHandle(at))?.next;
        let handle = self.allocate(instruction, Some(at), next);
        self.nodes[at.index()].next = Some(handle);
        match next {
            Some(next) => self.nodes[next.index()].prev = Some(handle),
            None => self.tail = Some(handle),
        }
        Ok(handle)
    }

    /// Replaces the instruction behind `handle` in place and returns the previous one.
    ///
    /// The handle, and therefore every branch to it, stays valid.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidHandle`] if `handle` is not live.
    pub fn set(
        &mut self,
        handle: InstructionHandle,
        instruction: Instruction,
    ) -> Result<Instruction> {
        if !self.contains(handle) {
            return Err(Error::InvalidHandle(handle));
        }

        self.positions_valid = false;
        let node = &mut self.nodes[handle.index()];
        node.long_form = false;
        Ok(std::mem::replace(&mut node.instruction, instruction))
    }

    /// Collects the handles from `from` through `to`, both inclusive.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidHandle`] if either handle is not live and
    /// [`crate::Error::InvalidOperand`] if `to` does not follow `from`.
    pub fn range(
        &self,
        from: InstructionHandle,
        to: InstructionHandle,
    ) -> Result<Vec<InstructionHandle>> {
        if !self.contains(from) {
            return Err(Error::InvalidHandle(from));
        }
        if !self.contains(to) {
            return Err(Error::InvalidHandle(to));
        }

        let mut handles = Vec::new();
        let mut cursor = Some(from);
        while let Some(handle) = cursor {
            handles.push(handle);
            if handle == to {
                return Ok(handles);
            }
            cursor = self.next(handle);
        }

        Err(Error::InvalidOperand(format!(
            "{to} does not follow {from} in the instruction stream"
        )))
    }

    /// Deletes the instructions from `from` through `to`, both inclusive.
    ///
    /// Nothing is removed if the range is invalid or if any instruction in it is targeted
    /// from outside the range.
    ///
    /// # Errors
    /// Returns [`crate::Error::DanglingBranchTarget`] for a live external target, plus the
    /// errors of [`InstructionList::range`].
    pub fn delete_range(&mut self, from: InstructionHandle, to: InstructionHandle) -> Result<()> {
        let handles = self.range(from, to)?;
        if let Some((target, targeter)) = self.external_targeter(&handles) {
            return Err(Error::DanglingBranchTarget { target, targeter });
        }

        let before = self.prev(from);
        let after = self.next(to);
        match before {
            Some(before) => self.nodes[before.index()].next = after,
            None => self.head = after,
        }
        match after {
            Some(after) => self.nodes[after.index()].prev = before,
            None => self.tail = before,
        }

        for handle in &handles {
            let node = &mut self.nodes[handle.index()];
            node.live = false;
            node.prev = None;
            node.next = None;
        }
        self.len -= handles.len();
        self.positions_valid = false;

        Ok(())
    }

    /// Deletes a single instruction.
    ///
    /// # Errors
    /// See [`InstructionList::delete_range`].
    pub fn delete(&mut self, handle: InstructionHandle) -> Result<()> {
        self.delete_range(handle, handle)
    }

    /// Everything that refers to `handle` as a control flow target.
    #[must_use]
    pub fn targeters(&self, handle: InstructionHandle) -> Vec<Targeter> {
        let branches = self
            .iter()
            .filter(|(_, instruction)| instruction.branches_to(handle))
            .map(|(source, _)| Targeter::Instruction(source));

        let handlers = self
            .handlers
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.refers_to(handle))
            .map(|(index, _)| Targeter::ExceptionHandler(index));

        branches.chain(handlers).collect()
    }

    /// Returns `true` if any branch or exception handler refers to `handle`.
    #[must_use]
    pub fn is_targeted(&self, handle: InstructionHandle) -> bool {
        self.handlers.iter().any(|entry| entry.refers_to(handle))
            || self
                .iter()
                .any(|(_, instruction)| instruction.branches_to(handle))
    }

    /// Finds an instruction of `range` that is targeted from outside of it.
    ///
    /// Exception handlers always count as outside. Returns the targeted instruction and one
    /// of its targeters.
    #[must_use]
    pub fn external_targeter(
        &self,
        range: &[InstructionHandle],
    ) -> Option<(InstructionHandle, Targeter)> {
        let inside: HashSet<InstructionHandle> = range.iter().copied().collect();

        for (index, entry) in self.handlers.iter().enumerate() {
            for &handle in range {
                if entry.refers_to(handle) {
                    return Some((handle, Targeter::ExceptionHandler(index)));
                }
            }
        }

        for (source, instruction) in self.iter() {
            if inside.contains(&source) {
                continue;
            }
            for target in instruction.targets() {
                if inside.contains(&target) {
                    return Some((target, Targeter::Instruction(source)));
                }
            }
        }

        None
    }

    /// The exception table of this method, in handler priority order.
    #[must_use]
    pub fn exception_handlers(&self) -> &[ExceptionHandler] {
        &self.handlers
    }

    /// Appends an exception table entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidHandle`] if any handle of the entry is not live.
    pub fn add_exception_handler(&mut self, entry: ExceptionHandler) -> Result<()> {
        for handle in [Some(entry.start), entry.end, Some(entry.handler)]
            .into_iter()
            .flatten()
        {
            if !self.contains(handle) {
                return Err(Error::InvalidHandle(handle));
            }
        }

        self.handlers.push(entry);
        Ok(())
    }

    /// Lays the stream out and assigns a byte offset to every instruction.
    ///
    /// `goto` and `jsr` are widened to `goto_w`/`jsr_w` when their displacement does not fit
    /// in 16 bits; layout repeats until no further widening is needed. Returns the length
    /// of the code array.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidHandle`] for a target that is no longer live,
    /// [`crate::Error::BranchOutOfRange`] for a conditional branch whose displacement does not
    /// fit, and [`crate::Error::Malformed`] when the code would exceed 65535 bytes.
    pub fn recompute_positions(&mut self) -> Result<u32> {
        loop {
            let length = self.layout()?;

            let mut widen = Vec::new();
            for (source, instruction) in self.iter() {
                let position = i64::from(self.nodes[source.index()].position);
                for target in instruction.targets() {
                    let target_node = self.node(target).ok_or(Error::InvalidHandle(target))?;
                    let displacement = i64::from(target_node.position) - position;
                    if i16::try_from(displacement).is_ok() {
                        continue;
                    }

                    match instruction {
                        Instruction::Goto { .. } | Instruction::Jsr { .. } => {
                            if !self.nodes[source.index()].long_form {
                                widen.push(source);
                            }
                        }
                        Instruction::Switch { .. } => {}
                        _ => {
                            return Err(Error::BranchOutOfRange {
                                offset: self.nodes[source.index()].position,
                            })
                        }
                    }
                }
            }

            for entry in &self.handlers {
                for handle in [Some(entry.start), entry.end, Some(entry.handler)]
                    .into_iter()
                    .flatten()
                {
                    if !self.contains(handle) {
                        return Err(Error::InvalidHandle(handle));
                    }
                }
            }

            if widen.is_empty() {
                self.positions_valid = true;
                return Ok(length);
            }

            for handle in widen {
                self.nodes[handle.index()].long_form = true;
            }
        }
    }

    /// Byte offset of `handle`, valid after [`InstructionList::recompute_positions`].
    #[must_use]
    pub fn position(&self, handle: InstructionHandle) -> Option<u32> {
        if !self.positions_valid {
            return None;
        }
        self.node(handle).map(|node| node.position)
    }

    /// Returns `true` once positions are computed and no edit happened since.
    #[must_use]
    pub fn positions_valid(&self) -> bool {
        self.positions_valid
    }

    /// Whether `goto`/`jsr` at `handle` was widened by the last layout.
    pub(crate) fn is_long_form(&self, handle: InstructionHandle) -> bool {
        self.node(handle).is_some_and(|node| node.long_form)
    }

    fn layout(&mut self) -> Result<u32> {
        let mut offset: u32 = 0;
        let mut cursor = self.head;
        while let Some(handle) = cursor {
            let node = &mut self.nodes[handle.index()];
            node.position = offset;
            offset += encoded_size(&node.instruction, offset, node.long_form);
            cursor = node.next;
        }

        if offset > u32::from(u16::MAX) {
            return Err(malformed_error!(
                "Code array of {} bytes exceeds the 65535 byte limit",
                offset
            ));
        }

        Ok(offset)
    }

    fn node(&self, handle: InstructionHandle) -> Option<&Node> {
        self.nodes.get(handle.index()).filter(|node| node.live)
    }

    fn allocate(
        &mut self,
        instruction: Instruction,
        prev: Option<InstructionHandle>,
        next: Option<InstructionHandle>,
    ) -> InstructionHandle {
        let index = u32::try_from(self.nodes.len()).unwrap_or(u32::MAX);
        self.nodes.push(Node {
            instruction,
            prev,
            next,
            live: true,
            position: 0,
            long_form: false,
        });
        self.len += 1;
        self.positions_valid = false;
        InstructionHandle(index)
    }
}

/// Iterator over the live instructions of an [`InstructionList`].
pub struct Iter<'a> {
    list: &'a InstructionList,
    cursor: Option<InstructionHandle>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (InstructionHandle, &'a Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = self.list.node(handle)?;
        self.cursor = node.next;
        Some((handle, &node.instruction))
    }
}

impl<'a> IntoIterator for &'a InstructionList {
    type Item = (InstructionHandle, &'a Instruction);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{Condition, Relation, TypeTag};

    fn handles(list: &InstructionList) -> Vec<InstructionHandle> {
        list.iter().map(|(handle, _)| handle).collect()
    }

    #[test]
    fn test_append_and_navigate() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::int_const(1));
        let b = list.append(Instruction::int_const(2));

        assert_eq!(list.head(), Some(a));
        assert_eq!(list.tail(), Some(b));
        assert_eq!(list.next(a), Some(b));
        assert_eq!(list.prev(b), Some(a));
        assert_eq!(list.prev(a), None);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_insert() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::int_const(1));
        let c = list.append(Instruction::int_const(3));
        let b = list.insert_after(a, Instruction::int_const(2)).unwrap();
        let first = list.insert_before(a, Instruction::int_const(0)).unwrap();

        assert_eq!(handles(&list), vec![first, a, b, c]);
        assert_eq!(list.head(), Some(first));
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_delete_keeps_handles_stable() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::int_const(1));
        let b = list.append(Instruction::int_const(2));
        let c = list.append(Instruction::int_const(3));

        list.delete(b).unwrap();
        assert_eq!(handles(&list), vec![a, c]);
        assert!(matches!(list.delete(b), Err(Error::InvalidHandle(h)) if h == b));

        let d = list.append(Instruction::int_const(4));
        assert_ne!(d, b);
    }

    #[test]
    fn test_delete_range_rejects_external_target() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::int_const(1));
        let b = list.append(Instruction::Store {
            slot: 1,
            ty: TypeTag::Int,
        });
        let c = list.append(Instruction::Goto { target: b });

        let result = list.delete_range(a, b);
        assert_eq!(
            result,
            Err(Error::DanglingBranchTarget {
                target: b,
                targeter: Targeter::Instruction(c),
            })
        );
        assert_eq!(list.len(), 3);

        // a range that contains the branch as well may go
        list.delete_range(b, c).unwrap();
        assert_eq!(handles(&list), vec![a]);
    }

    #[test]
    fn test_delete_range_reversed() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::int_const(1));
        let b = list.append(Instruction::int_const(2));

        assert!(matches!(
            list.delete_range(b, a),
            Err(Error::InvalidOperand(_))
        ));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_exception_handler_targets() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::nop());
        let b = list.append(Instruction::nop());
        list.add_exception_handler(ExceptionHandler {
            start: a,
            end: None,
            handler: b,
            catch_type: 0,
        })
        .unwrap();

        assert_eq!(list.targeters(b), vec![Targeter::ExceptionHandler(0)]);
        assert!(list.is_targeted(a));
        assert!(matches!(
            list.delete(b),
            Err(Error::DanglingBranchTarget { .. })
        ));
    }

    #[test]
    fn test_recompute_positions() {
        let mut list = InstructionList::new();
        let a = list.append(Instruction::int_const(100));
        let b = list.append(Instruction::If {
            condition: Condition::Zero(Relation::Ne),
            target: a,
        });
        let c = list.append(Instruction::Load {
            slot: 4,
            ty: TypeTag::Int,
        });

        assert_eq!(list.position(a), None);
        let length = list.recompute_positions().unwrap();
        assert_eq!(length, 2 + 3 + 2);
        assert_eq!(list.position(a), Some(0));
        assert_eq!(list.position(b), Some(2));
        assert_eq!(list.position(c), Some(5));
    }

    #[test]
    fn test_goto_widening() {
        let mut list = InstructionList::new();
        let start = list.append(Instruction::nop());
        for _ in 0..33_000 {
            list.append(Instruction::nop());
        }
        let jump = list.append(Instruction::Goto { target: start });

        list.recompute_positions().unwrap();
        assert!(list.is_long_form(jump));
        assert!(!list.is_long_form(start));
    }

    #[test]
    fn test_conditional_out_of_range() {
        let mut list = InstructionList::new();
        let start = list.append(Instruction::nop());
        for _ in 0..33_000 {
            list.append(Instruction::nop());
        }
        list.append(Instruction::If {
            condition: Condition::Zero(Relation::Eq),
            target: start,
        });

        assert!(matches!(
            list.recompute_positions(),
            Err(Error::BranchOutOfRange { offset: 33_001 })
        ));
    }
}
