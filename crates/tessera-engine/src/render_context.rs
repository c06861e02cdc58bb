// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of a node, stable for the lifetime of the compiled template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    /// Fixed slot holding the inheritance state of the current render.
    pub const BLOCK_CONTEXT: NodeId = NodeId(0);

    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Frame = HashMap<NodeId, Box<dyn Any + Send>>;

/// Per-render, per-node scratch storage.
///
/// One frame is pushed for every top-level render call, so two renders of the
/// same compiled template never observe each other's state.
#[derive(Default)]
pub struct RenderContext {
    frames: Vec<Frame>,
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("depth", &self.frames.len())
            .finish()
    }
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    fn current_mut(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::new());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.current().map_or(false, |frame| frame.contains_key(&id))
    }

    pub fn get<T: Any>(&self, id: NodeId) -> Option<&T> {
        self.current()?.get(&id)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, id: NodeId) -> Option<&mut T> {
        self.frames.last_mut()?.get_mut(&id)?.downcast_mut::<T>()
    }

    pub fn insert<T: Any + Send>(&mut self, id: NodeId, data: T) {
        self.current_mut().insert(id, Box::new(data));
    }

    pub fn remove(&mut self, id: NodeId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.remove(&id);
        }
    }

    /// Runs `f` on the data stored for `id`, creating it with `T::default()` on first use.
    pub fn with_data<T, R>(&mut self, id: NodeId, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Any + Send + Default,
    {
        let frame = self.current_mut();
        let mut data = match frame.remove(&id).map(|boxed| boxed.downcast::<T>()) {
            Some(Ok(data)) => data,
            _ => Box::<T>::default(),
        };
        let result = f(&mut data);
        frame.insert(id, data);
        result
    }
}
