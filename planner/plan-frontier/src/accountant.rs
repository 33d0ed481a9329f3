use std::collections::BTreeMap;

use log::debug;
use plan_info::caps::MAX_CAP_INDEX;

use crate::{CapRequest, FrontierError, KernelObject, ObjectKind, Scope};

/// Next unused capability slot and kernel-memory offset of a scope.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Frontier {
    pub cap: u32,
    pub kmem: u64,
}

impl Frontier {
    #[inline]
    #[must_use]
    pub const fn new(cap: u32, kmem: u64) -> Self {
        Self { cap, kmem }
    }
}

/// Where one object landed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Allocation {
    pub cap: u32,
    pub kmem: u64,
    /// Footprint after rounding to the kernel-memory slot size.
    pub size: u64,
}

/// What one kind occupies in one scope. Fronts are exclusive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct KindSpan {
    pub cap_base: u32,
    pub cap_front: u32,
    pub kmem_base: u64,
    pub kmem_front: u64,
    pub count: u32,
}

#[derive(Debug, Clone)]
struct ScopeState {
    front: Frontier,
    last_kind: Option<ObjectKind>,
    issued: BTreeMap<u32, String>,
}

/// Hands out capability slots and kernel-memory offsets.
///
/// Every scope advances monotonically; kinds arrive in [`ObjectKind`] order.
#[derive(Debug, Clone)]
pub struct Accountant {
    kmem_order: u32,
    scopes: BTreeMap<Scope, ScopeState>,
    spans: BTreeMap<(Scope, ObjectKind), KindSpan>,
}

impl Accountant {
    /// `kmem_order` is log2 of the kernel-memory slot; footprints round up to it.
    #[must_use]
    pub const fn new(kmem_order: u32) -> Self {
        Self {
            kmem_order,
            scopes: BTreeMap::new(),
            spans: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn kmem_order(&self) -> u32 {
        self.kmem_order
    }

    /// Starts `scope` at `start`.
    ///
    /// # Errors
    /// [`FrontierError::ScopeReopened`], [`FrontierError::MisalignedStart`] if
    /// `start.kmem` is not slot aligned, [`FrontierError::CapOverflow`].
    pub fn open(&mut self, scope: Scope, start: Frontier) -> Result<(), FrontierError> {
        if self.scopes.contains_key(&scope) {
            return Err(FrontierError::ScopeReopened { scope });
        }
        let align = self.slot_size();
        if !start.kmem.is_multiple_of(align) {
            return Err(FrontierError::MisalignedStart {
                scope,
                kmem: start.kmem,
                align,
            });
        }
        if start.cap > MAX_CAP_INDEX {
            return Err(FrontierError::CapOverflow {
                scope,
                name: String::from("<scope start>"),
            });
        }

        debug!("{scope}: opened at cap {}, kmem {:#x}", start.cap, start.kmem);
        self.scopes.insert(
            scope,
            ScopeState {
                front: start,
                last_kind: None,
                issued: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Issues a slot and `footprint` bytes of kernel memory to `object`.
    ///
    /// # Errors
    /// - [`FrontierError::UnknownScope`] if `scope` was not opened.
    /// - [`FrontierError::OutOfOrder`] if `object` is of an earlier kind than
    ///   the previous allocation in `scope`.
    /// - [`FrontierError::Collision`] / [`FrontierError::BehindFrontier`] for a
    ///   fixed slot that was issued already or lies behind the frontier.
    /// - [`FrontierError::CapOverflow`] / [`FrontierError::KmemOverflow`].
    pub fn allocate(
        &mut self,
        scope: Scope,
        object: &dyn KernelObject,
        footprint: u64,
    ) -> Result<Allocation, FrontierError> {
        let slot = self.slot_size();
        let state = self
            .scopes
            .get_mut(&scope)
            .ok_or(FrontierError::UnknownScope { scope })?;
        let kind = object.kind();
        let name = object.name();

        if let Some(after) = state.last_kind
            && kind < after
        {
            return Err(FrontierError::OutOfOrder {
                scope,
                kind,
                after,
                name: name.to_owned(),
            });
        }

        let cap = match object.cap_request() {
            CapRequest::Auto => state.front.cap,
            CapRequest::Fixed(index) => {
                if let Some(holder) = state.issued.get(&index) {
                    return Err(FrontierError::Collision {
                        scope,
                        index,
                        name: name.to_owned(),
                        holder: holder.clone(),
                    });
                }
                if index < state.front.cap {
                    return Err(FrontierError::BehindFrontier {
                        scope,
                        index,
                        front: state.front.cap,
                        name: name.to_owned(),
                    });
                }
                index
            }
        };
        if cap > MAX_CAP_INDEX {
            return Err(FrontierError::CapOverflow {
                scope,
                name: name.to_owned(),
            });
        }

        let overflow = || FrontierError::KmemOverflow {
            scope,
            name: name.to_owned(),
        };
        let size = footprint
            .checked_next_multiple_of(slot)
            .ok_or_else(overflow)?;
        let kmem = state.front.kmem;
        let kmem_front = kmem.checked_add(size).ok_or_else(overflow)?;

        state.front = Frontier::new(cap + 1, kmem_front);
        state.last_kind = Some(kind);
        state.issued.insert(cap, name.to_owned());

        let span = self.spans.entry((scope, kind)).or_insert(KindSpan {
            cap_base: cap,
            cap_front: cap,
            kmem_base: kmem,
            kmem_front: kmem,
            count: 0,
        });
        span.cap_front = cap + 1;
        span.kmem_front = kmem_front;
        span.count += 1;

        debug!("{scope}: {kind} `{name}` -> cap {cap}, kmem {kmem:#x} +{size:#x}");
        Ok(Allocation { cap, kmem, size })
    }

    #[must_use]
    pub fn front(&self, scope: Scope) -> Option<Frontier> {
        self.scopes.get(&scope).map(|s| s.front)
    }

    #[must_use]
    pub fn span(&self, scope: Scope, kind: ObjectKind) -> Option<KindSpan> {
        self.spans.get(&(scope, kind)).copied()
    }

    /// Spans of every kind allocated in `scope`, in kind order.
    pub fn spans(&self, scope: Scope) -> impl Iterator<Item = (ObjectKind, KindSpan)> + '_ {
        self.spans
            .range((scope, ObjectKind::Captbl)..=(scope, ObjectKind::Vector))
            .map(|(&(_, kind), &span)| (kind, span))
    }

    /// Objects issued in `scope` so far.
    #[must_use]
    pub fn issued(&self, scope: Scope) -> usize {
        self.scopes.get(&scope).map_or(0, |s| s.issued.len())
    }

    const fn slot_size(&self) -> u64 {
        1 << self.kmem_order
    }
}

/// Table nodes needed for `objects` entries when every node also takes one
/// slot of the table it lives in. `None` if a node cannot hold anything
/// besides itself.
#[must_use]
pub fn captbl_nodes_for(objects: u64, capacity: u32) -> Option<u64> {
    if capacity < 2 {
        return None;
    }
    Some(objects.div_ceil(u64::from(capacity) - 1))
}
