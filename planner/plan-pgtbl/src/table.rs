use std::collections::BTreeMap;

use log::{debug, trace};
use plan_memory::{MemAttr, PhysicalAddress, VirtualAddress};

use crate::{Level, PgtblError, PgtblShape};

/// `count` consecutive finest-granule pages mapped from `virt` to `phys`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MapRun {
    pub phys: PhysicalAddress,
    pub virt: VirtualAddress,
    pub count: u64,
    pub attr: MemAttr,
}

impl MapRun {
    #[inline]
    #[must_use]
    pub const fn new(
        phys: PhysicalAddress,
        virt: VirtualAddress,
        count: u64,
        attr: MemAttr,
    ) -> Self {
        Self {
            phys,
            virt,
            count,
            attr,
        }
    }

    /// A run mapping `base` onto itself.
    #[inline]
    #[must_use]
    pub const fn identity(base: u64, count: u64, attr: MemAttr) -> Self {
        Self::new(PhysicalAddress::new(base), VirtualAddress::new(base), count, attr)
    }
}

/// Index of a node in [`PageTable::nodes`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A block mapping `2^order` bytes.
///
/// When `order` exceeds the owning node's entry size the leaf occupies
/// `2^(order - size_order)` consecutive entries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Leaf {
    pub virt: VirtualAddress,
    pub phys: PhysicalAddress,
    pub order: u32,
    pub attr: MemAttr,
}

impl Leaf {
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        1 << self.order
    }

    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        (va >= self.virt && va.offset_from(self.virt) < self.size())
            .then(|| self.phys + va.offset_from(self.virt))
    }
}

/// A node holds either leaves or child tables, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entries {
    Leaves(Vec<Leaf>),
    /// Entry index to child node. Only entries carrying mappings have one.
    Children(BTreeMap<u64, NodeId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgtblNode {
    pub base: VirtualAddress,
    pub size_order: u32,
    pub num_order: u32,
    /// Depth in the shape's level list, not in this tree.
    pub level: usize,
    pub is_top: bool,
    /// Parent node and the entry of the parent this node hangs off.
    pub parent: Option<(NodeId, u64)>,
    pub entries: Entries,
}

impl PgtblNode {
    #[inline]
    #[must_use]
    pub const fn span_order(&self) -> u32 {
        self.size_order + self.num_order
    }

    #[inline]
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self.entries, Entries::Children(_))
    }

    #[must_use]
    pub fn covers(&self, va: VirtualAddress) -> bool {
        va >= self.base && va.offset_from(self.base) >> self.span_order() == 0
    }
}

/// Arena of page table nodes in pre-order; the root is at index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    nodes: Vec<PgtblNode>,
}

impl PageTable {
    #[must_use]
    pub fn root(&self) -> &PgtblNode {
        &self.nodes[NodeId::ROOT.0]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &PgtblNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn nodes(&self) -> &[PgtblNode] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a table has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn preorder(&self) -> impl Iterator<Item = (NodeId, &PgtblNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Every leaf, nodes in pre-order and leaves by address within a node.
    pub fn leaves(&self) -> impl Iterator<Item = &Leaf> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.entries {
                Entries::Leaves(leaves) => Some(leaves),
                Entries::Children(_) => None,
            })
            .flatten()
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    #[must_use]
    pub fn directory_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_directory()).count()
    }

    #[must_use]
    pub fn mapped_bytes(&self) -> u64 {
        self.leaves().map(Leaf::size).sum()
    }

    /// Walks the tree for `va`.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<(PhysicalAddress, MemAttr)> {
        let mut node = self.nodes.first()?;
        loop {
            if !node.covers(va) {
                return None;
            }
            match &node.entries {
                Entries::Leaves(leaves) => {
                    return leaves
                        .iter()
                        .find_map(|l| l.translate(va).map(|pa| (pa, l.attr)));
                }
                Entries::Children(children) => {
                    let entry = va.offset_from(node.base) >> node.size_order;
                    node = &self.nodes[children.get(&entry)?.0];
                }
            }
        }
    }
}

/// Builds the smallest tree of `shape` mapping every run.
///
/// # Errors
/// See [`PgtblError`]; nothing is built unless every run is valid.
pub fn build(shape: &PgtblShape, runs: &[MapRun]) -> Result<PageTable, PgtblError> {
    let order = validate(shape, runs)?;
    let chunks = decompose(shape, runs, &order);
    let (base, level) = root_of(shape, &chunks);

    let mut builder = Builder {
        shape,
        nodes: Vec::new(),
    };
    builder.node(VirtualAddress::new(base), level, None, chunks);

    let table = PageTable {
        nodes: builder.nodes,
    };
    debug!(
        "page table rooted at {} (level {level}): {} nodes, {} leaves, {:#x} bytes",
        VirtualAddress::new(base),
        table.len(),
        table.leaf_count(),
        table.mapped_bytes()
    );
    Ok(table)
}

/// Checks every run and returns run indices in ascending virtual order.
fn validate(shape: &PgtblShape, runs: &[MapRun]) -> Result<Vec<usize>, PgtblError> {
    if runs.is_empty() {
        return Err(PgtblError::NoRuns);
    }

    let unit_order = shape.unit_order();
    let span = 1u64 << shape.span_order();
    let mut ends = Vec::with_capacity(runs.len());

    for (run, r) in runs.iter().enumerate() {
        if r.count == 0 {
            return Err(PgtblError::EmptyRun { run });
        }
        if !r.virt.is_aligned(unit_order) || !r.phys.is_aligned(unit_order) {
            return Err(PgtblError::Unaligned {
                run,
                virt: r.virt,
                phys: r.phys,
                unit: 1 << unit_order,
            });
        }
        let len = r
            .count
            .checked_mul(1 << unit_order)
            .ok_or(PgtblError::LengthOverflow { run })?;
        let end = r
            .virt
            .checked_add(len)
            .ok_or(PgtblError::LengthOverflow { run })?;
        r.phys
            .checked_add(len)
            .ok_or(PgtblError::LengthOverflow { run })?;
        if end.as_u64() > span {
            return Err(PgtblError::OutOfRange { run, span });
        }
        ends.push(end);
    }

    let mut order: Vec<usize> = (0..runs.len()).collect();
    order.sort_by_key(|&i| (runs[i].virt, i));
    for w in order.windows(2) {
        if ends[w[0]] > runs[w[1]].virt {
            return Err(PgtblError::Overlap {
                first: w[0].min(w[1]),
                second: w[0].max(w[1]),
            });
        }
    }
    Ok(order)
}

/// Greedy split of every run into the coarsest granules both sides allow.
fn decompose(shape: &PgtblShape, runs: &[MapRun], order: &[usize]) -> Vec<Leaf> {
    let unit_order = shape.unit_order();
    let mut chunks = Vec::new();

    for run in order.iter().map(|&i| &runs[i]) {
        let mut virt = run.virt;
        let mut phys = run.phys;
        let mut remaining = run.count << unit_order;

        while remaining > 0 {
            let order = shape
                .granules()
                .iter()
                .copied()
                .find(|&g| virt.is_aligned(g) && phys.is_aligned(g) && remaining >= 1 << g)
                .unwrap_or(unit_order);
            chunks.push(Leaf {
                virt,
                phys,
                order,
                attr: run.attr,
            });
            virt += 1 << order;
            phys += 1 << order;
            remaining -= 1 << order;
        }
    }

    trace!("{} runs split into {} chunks", runs.len(), chunks.len());
    chunks
}

/// Base and level of the root node.
fn root_of(shape: &PgtblShape, chunks: &[Leaf]) -> (u64, usize) {
    let (Some(first), Some(last)) = (chunks.first(), chunks.last()) else {
        return (0, 0);
    };
    if !shape.is_floating() {
        return (0, 0);
    }

    let lo_addr = first.virt.as_u64();
    let hi_addr = last.virt.as_u64() + (last.size() - 1);
    let levels = shape.levels();
    let mut base = 0;
    let mut level = 0;

    while level + 1 < levels.len() {
        let Level { size_order, .. } = levels[level];
        let lo = (lo_addr - base) >> size_order;
        let hi = (hi_addr - base) >> size_order;
        if lo != hi || chunks.iter().any(|c| c.order >= size_order) {
            break;
        }
        base += lo << size_order;
        level += 1;
    }
    (base, level)
}

struct Builder<'a> {
    shape: &'a PgtblShape,
    nodes: Vec<PgtblNode>,
}

impl Builder<'_> {
    fn node(
        &mut self,
        base: VirtualAddress,
        level: usize,
        parent: Option<(NodeId, u64)>,
        chunks: Vec<Leaf>,
    ) -> NodeId {
        let Level {
            size_order,
            num_order,
        } = self.shape.levels()[level];
        let id = NodeId(self.nodes.len());

        // The bottom level's entry size is the finest granule, so recursion
        // always ends in leaf mode.
        let leaf_mode = chunks.iter().all(|c| c.order >= size_order);
        self.nodes.push(PgtblNode {
            base,
            size_order,
            num_order,
            level,
            is_top: parent.is_none(),
            parent,
            entries: if leaf_mode {
                Entries::Leaves(Vec::new())
            } else {
                Entries::Children(BTreeMap::new())
            },
        });
        if leaf_mode {
            trace!("node {} at {base}: {} leaves", id.0, chunks.len());
            self.nodes[id.0].entries = Entries::Leaves(chunks);
            return id;
        }

        let entry_of = |va: VirtualAddress| va.offset_from(base) >> size_order;
        let mut per_entry: BTreeMap<u64, Vec<Leaf>> = BTreeMap::new();
        for chunk in chunks {
            if chunk.order <= size_order {
                per_entry.entry(entry_of(chunk.virt)).or_default().push(chunk);
                continue;
            }
            // Too coarse to sit beside child tables: one piece per entry.
            for k in 0..1u64 << (chunk.order - size_order) {
                let offset = k << size_order;
                let piece = Leaf {
                    virt: chunk.virt + offset,
                    phys: chunk.phys + offset,
                    order: size_order,
                    attr: chunk.attr,
                };
                per_entry.entry(entry_of(piece.virt)).or_default().push(piece);
            }
        }

        let mut children = BTreeMap::new();
        for (entry, group) in per_entry {
            let child_base = base + (entry << size_order);
            let child = self.node(child_base, level + 1, Some((id, entry)), group);
            children.insert(entry, child);
        }
        trace!("node {} at {base}: {} children", id.0, children.len());
        self.nodes[id.0].entries = Entries::Children(children);
        id
    }
}
