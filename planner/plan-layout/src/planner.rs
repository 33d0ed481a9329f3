use log::{debug, info};
use plan_frontier::{
    Accountant, Allocation, Frontier, FrontierError, KernelObject, ObjectKind, Promoted, Scope,
    Synthetic, captbl_nodes_for,
};
use plan_info::caps::{KERNEL_CAP_FRONT, PROCESS_CAP_FRONT, RUNTIME_CAP_FRONT};
use plan_info::memory::{
    DEFAULT_KERNEL_STACK, DEFAULT_RUNTIME_STACK, ENTRY_SLOT_WORDS, PROCESS_HEADER_WORDS,
    VECTOR_FLAG_ALIGN, VECTOR_FLAG_SETS,
};
use plan_memory::{MemAttr, Section};
use plan_model::{Chip, MemReq, Place, ProcessDecl, Project};
use plan_pgtbl::{MapRun, PageTable};
use plan_platform::Geometry;
use plan_region::{FitError, MemoryRegion, RegionKind, build_maps, fit_auto, fit_static};

use crate::maps::{
    InvocationMap, KernelMap, KernelVector, Layout, LocalTable, PgtblMap, PlacedSegment,
    PortMap, ProcessMap, ProcessMemory, ReceiveMap, RuntimeMap, SendMap, ThreadMap, VectorMap,
};
use crate::{LayoutError, wiring};

/// One memory request on its way through alignment and fitting.
#[derive(Debug, Clone)]
struct Request {
    owner: String,
    what: String,
    kind: RegionKind,
    req: MemReq,
    base: u64,
}

impl Request {
    fn new(owner: &str, what: impl Into<String>, kind: RegionKind, req: MemReq) -> Self {
        Self {
            owner: owner.to_owned(),
            what: what.into(),
            kind,
            req,
            base: 0,
        }
    }

    const fn section(&self) -> Section {
        Section::new(self.base, self.req.size)
    }

    fn fit_error(&self, source: FitError) -> LayoutError {
        LayoutError::Fit {
            owner: self.owner.clone(),
            what: self.what.clone(),
            source,
        }
    }
}

/// Every request of the image, grouped by owner.
struct Requests {
    /// Code, data, stack, vector flags, kernel memory.
    kernel: [Request; 5],
    /// Code, data, stack.
    runtime: [Request; 3],
    /// One request per segment.
    processes: Vec<Vec<Request>>,
}

impl Requests {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.kernel
            .iter_mut()
            .chain(self.runtime.iter_mut())
            .chain(self.processes.iter_mut().flatten())
    }
}

/// A process after stacks and entry points are placed.
struct ProcessImage {
    memory: ProcessMemory,
    segments: Vec<PlacedSegment>,
    /// Entry and stack of each thread, then of each invocation.
    threads: Vec<(u64, Section)>,
    invocations: Vec<(u64, Section)>,
    pgtbl: PageTable,
}

/// Local slots of one process's objects.
struct LocalCaps {
    ports: Vec<u32>,
    receives: Vec<u32>,
    sends: Vec<u32>,
    vectors: Vec<u32>,
    slots: u32,
}

/// Runtime-table allocations of one process.
struct RuntimeCaps {
    captbl: Allocation,
    pgtbl: Vec<Allocation>,
    process: Allocation,
    threads: Vec<Allocation>,
    invocations: Vec<Allocation>,
    receives: Vec<Allocation>,
    vectors: Vec<Allocation>,
}

/// Runs every pass for one target family.
pub struct Planner<'a, G: Geometry> {
    geometry: G,
    chip: &'a Chip,
    project: &'a Project,
}

impl<'a, G: Geometry> Planner<'a, G> {
    /// Parses the platform options and checks the input.
    ///
    /// # Errors
    /// Platform or wiring errors.
    pub fn new(chip: &'a Chip, project: &'a Project) -> Result<Self, LayoutError> {
        let geometry = G::parse_options(&chip.options)?;
        geometry.check_input(chip, project)?;
        wiring::check(chip, project)?;
        info!("{} geometry accepted the input", geometry.name());

        Ok(Self {
            geometry,
            chip,
            project,
        })
    }

    /// Runs the remaining passes.
    ///
    /// # Errors
    /// The first placement, page table or accounting failure.
    pub fn run(self) -> Result<Layout, LayoutError> {
        let mut requests = self.requests()?;
        self.fit(&mut requests)?;

        let images = self
            .project
            .processes
            .iter()
            .zip(&requests.processes)
            .map(|(decl, segs)| self.place_process(decl, segs))
            .collect::<Result<Vec<_>, _>>()?;

        // The runtime drains the kernel's vector flags, so it maps them too.
        let [code, data, stack] = &requests.runtime;
        let flags = &requests.kernel[3];
        let runs = [code, data, stack, flags].map(|r| (r.section(), r.req.attr));
        let runtime_pgtbl = self.pgtbl("runtime", runs)?;

        self.account(&requests, runtime_pgtbl, images)
    }

    /// Collects and aligns every memory request in declaration order.
    fn requests(&self) -> Result<Requests, LayoutError> {
        let word = self.geometry.word_bytes();
        let kernel = &self.project.kernel;
        let runtime = &self.project.runtime;

        let stack = |size: u64, default: u64| {
            let size = if size == 0 { default } else { size };
            MemReq::auto(size, MemAttr::RW).with_align(self.geometry.stack_align())
        };
        let vector_words =
            wide(self.chip.vectors.len()).div_ceil(u64::from(self.geometry.word_bits()));
        let flags = MemReq::auto(VECTOR_FLAG_SETS * (word + word * vector_words), MemAttr::RW)
            .with_align(VECTOR_FLAG_ALIGN);

        let mut requests = Requests {
            kernel: [
                Request::new("kernel", "code", RegionKind::Code, kernel.code),
                Request::new("kernel", "data", RegionKind::Data, kernel.data),
                Request::new(
                    "kernel",
                    "stack",
                    RegionKind::Data,
                    stack(kernel.stack_size, DEFAULT_KERNEL_STACK),
                ),
                Request::new("kernel", "vector flags", RegionKind::Data, flags),
                Request::new("kernel", "kernel memory", RegionKind::Data, kernel.kmem),
            ],
            runtime: [
                Request::new("runtime", "code", RegionKind::Code, runtime.code),
                Request::new("runtime", "data", RegionKind::Data, runtime.data),
                Request::new(
                    "runtime",
                    "stack",
                    RegionKind::Data,
                    stack(runtime.stack_size, DEFAULT_RUNTIME_STACK),
                ),
            ],
            processes: self
                .project
                .processes
                .iter()
                .map(|p| {
                    p.segments
                        .iter()
                        .enumerate()
                        .map(|(i, s)| {
                            Request::new(&p.name, format!("{} segment {i}", s.kind), s.kind, s.req)
                        })
                        .collect()
                })
                .collect(),
        };

        for r in requests.iter_mut() {
            let aligned = self
                .geometry
                .align_mem(&r.req)
                .map_err(|source| LayoutError::Align {
                    owner: r.owner.clone(),
                    what: r.what.clone(),
                    source,
                })?;
            r.req = aligned;
        }
        Ok(requests)
    }

    /// Places fixed requests, then auto requests, each in declaration order.
    fn fit(&self, requests: &mut Requests) -> Result<(), LayoutError> {
        info!("fitting {} memory regions", self.chip.regions.len());
        let mut maps = build_maps(self.chip.regions.iter().cloned()).map_err(|source| {
            LayoutError::Fit {
                owner: self.chip.name.clone(),
                what: String::from("declared memory"),
                source,
            }
        })?;

        for r in requests.iter_mut() {
            if let Place::Fixed(base) = r.req.place {
                fit_static(&mut maps, r.kind, base, r.req.size, r.req.attr)
                    .map_err(|e| r.fit_error(e))?;
                r.base = base;
            }
        }
        for r in requests.iter_mut() {
            if r.req.place == Place::Auto {
                let base = fit_auto(&mut maps, r.kind, r.req.size, r.req.align, r.req.attr)
                    .map_err(|e| r.fit_error(e))?;
                r.base = base;
            }
        }

        for map in &maps {
            debug!(
                "region `{}`: {:#x} bytes free",
                map.region().name,
                map.free_bytes()
            );
        }
        Ok(())
    }

    /// Places the stacks and entry points of one process and builds its page
    /// table.
    fn place_process(
        &self,
        decl: &ProcessDecl,
        segs: &[Request],
    ) -> Result<ProcessImage, LayoutError> {
        let first = |kind: RegionKind| {
            segs.iter()
                .find(|s| s.kind == kind)
                .map(Request::section)
                .ok_or_else(|| LayoutError::MissingSegment {
                    process: decl.name.clone(),
                    kind,
                })
        };
        let code = first(RegionKind::Code)?;
        let data = first(RegionKind::Data)?;

        let fail = |what: String, source| LayoutError::Fit {
            owner: decl.name.clone(),
            what,
            source,
        };

        let data_regions = segs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind == RegionKind::Data)
            .map(|(i, s)| {
                MemoryRegion::new(
                    format!("{}.{i}", decl.name),
                    RegionKind::Data,
                    s.base,
                    s.req.size,
                    s.req.attr.with_static_only(false),
                )
            });
        let mut stacks = build_maps(data_regions).map_err(|e| fail("stacks".into(), e))?;
        if decl.data_reserve > 0 {
            let reserve = decl.data_reserve;
            fit_static(&mut stacks, RegionKind::Data, data.base, reserve, MemAttr::new())
                .map_err(|e| fail("data reserve".into(), e))?;
        }

        let mut entries = EntryCursor {
            process: &decl.name,
            code,
            word: self.geometry.word_bytes(),
            front: PROCESS_HEADER_WORDS * self.geometry.word_bytes(),
        };
        let mut stack = |name: &str, size| {
            let align = self.geometry.stack_align();
            fit_auto(&mut stacks, RegionKind::Data, size, align, MemAttr::RW)
                .map(|base| Section::new(base, size))
                .map_err(|e| fail(format!("stack of `{name}`"), e))
        };

        let mut threads = Vec::with_capacity(decl.threads.len());
        for t in &decl.threads {
            let entry = entries.place(segs, &t.name, t.entry)?;
            threads.push((entry, stack(&t.name, t.stack_size)?));
        }
        let mut invocations = Vec::with_capacity(decl.invocations.len());
        for i in &decl.invocations {
            let entry = entries.place(segs, &i.name, i.entry)?;
            invocations.push((entry, stack(&i.name, i.stack_size)?));
        }

        let segments: Vec<_> = segs
            .iter()
            .map(|s| PlacedSegment {
                kind: s.kind,
                section: s.section(),
                attr: s.req.attr,
            })
            .collect();
        let pgtbl = self.pgtbl(&decl.name, segments.iter().map(|s| (s.section, s.attr)))?;

        debug!(
            "process `{}`: code {code}, data {data}, {} entries",
            decl.name,
            threads.len() + invocations.len()
        );
        Ok(ProcessImage {
            memory: ProcessMemory {
                code,
                data,
                code_front: entries.front,
            },
            segments,
            threads,
            invocations,
            pgtbl,
        })
    }

    /// Builds an identity-mapped page table over `sections`.
    fn pgtbl(
        &self,
        owner: &str,
        sections: impl IntoIterator<Item = (Section, MemAttr)>,
    ) -> Result<PageTable, LayoutError> {
        let unit_order = self.geometry.shape().unit_order();
        let runs: Vec<_> = sections
            .into_iter()
            .map(|(s, attr)| MapRun::identity(s.base, s.size >> unit_order, attr))
            .collect();

        let table = self
            .geometry
            .alloc_pgtbl(&runs)
            .map_err(|source| LayoutError::Pgtbl {
                owner: owner.to_owned(),
                source,
            })?;
        self.geometry.check_pgtbl(owner, &table)?;
        debug!(
            "{owner}: page table of {} nodes ({} directories)",
            table.len(),
            table.directory_count()
        );
        Ok(table)
    }

    /// Slot counts of the nodes of a table holding `entries` objects. Every
    /// node is full except the last.
    fn table_nodes(&self, scope: Scope, entries: u64) -> Result<Vec<u32>, LayoutError> {
        let capacity = self.geometry.captbl_capacity();
        let nodes = captbl_nodes_for(entries, capacity).ok_or(LayoutError::CaptblOverflow {
            scope,
            front: 0,
            slots: 0,
        })?;

        let mut left = entries + nodes;
        Ok((0..nodes)
            .map(|_| {
                let n = left.min(u64::from(capacity));
                left -= n;
                u32::try_from(n).unwrap_or(capacity)
            })
            .collect())
    }

    fn alloc_table(
        &self,
        acct: &mut Accountant,
        scope: Scope,
        label: &str,
        slots: &[u32],
    ) -> Result<Vec<Allocation>, LayoutError> {
        slots
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let node = Synthetic::new(ObjectKind::Captbl, format!("{label} captbl #{i}"));
                Ok(acct.allocate(scope, &node, self.geometry.captbl_size(n))?)
            })
            .collect()
    }

    fn alloc_pgtbl(
        &self,
        acct: &mut Accountant,
        scope: Scope,
        label: &str,
        table: &PageTable,
    ) -> Result<Vec<Allocation>, LayoutError> {
        table
            .preorder()
            .map(|(id, node)| {
                let name = format!("{label} pgtbl #{}", id.index());
                let obj = Synthetic::new(ObjectKind::Pgtbl, name);
                let size = self.geometry.pgtbl_size(node.num_order, node.is_top);
                Ok(acct.allocate(scope, &obj, size)?)
            })
            .collect()
    }

    /// Fails if `scope` issued a slot its table does not have.
    fn check_table(
        acct: &Accountant,
        scope: Scope,
        slots: &[u32],
    ) -> Result<Frontier, LayoutError> {
        let front = acct.front(scope).ok_or(FrontierError::UnknownScope { scope })?;
        let slots: u64 = slots.iter().copied().map(u64::from).sum();
        if u64::from(front.cap) > slots {
            return Err(LayoutError::CaptblOverflow {
                scope,
                front: front.cap - 1,
                slots,
            });
        }
        Ok(front)
    }

    /// Process scopes, then the boot table, then the runtime table.
    #[allow(clippy::too_many_lines)]
    fn account(
        &self,
        requests: &Requests,
        runtime_pgtbl: PageTable,
        images: Vec<ProcessImage>,
    ) -> Result<Layout, LayoutError> {
        info!("allocating capabilities and kernel memory");
        let g = &self.geometry;
        let processes = &self.project.processes;
        let mut acct = Accountant::new(g.kmem_order());

        // Local tables: handles only, no kernel memory.
        let mut locals = Vec::with_capacity(processes.len());
        for (i, p) in processes.iter().enumerate() {
            let scope = Scope::Process(i);
            acct.open(scope, Frontier::new(PROCESS_CAP_FRONT, 0))?;
            let slots_of = |allocs: Vec<Allocation>| -> Vec<u32> {
                allocs.iter().map(|a| a.cap).collect()
            };
            let ports = slots_of(allocate_all(&mut acct, scope, &p.ports, 0)?);
            let receives = slots_of(allocate_all(&mut acct, scope, &p.receives, 0)?);
            let sends = slots_of(allocate_all(&mut acct, scope, &p.sends, 0)?);
            let vectors = slots_of(allocate_all(&mut acct, scope, &p.vectors, 0)?);

            let front = acct.front(scope).ok_or(FrontierError::UnknownScope { scope })?;
            let slots = front.cap.saturating_add(p.extra_captbl);
            if slots > g.captbl_capacity() {
                return Err(LayoutError::LocalTableFull {
                    process: p.name.clone(),
                    slots,
                    capacity: g.captbl_capacity(),
                });
            }
            locals.push(LocalCaps {
                ports,
                receives,
                sends,
                vectors,
                slots,
            });
        }

        let bound: Vec<_> = processes
            .iter()
            .flat_map(|p| p.vectors.iter().map(move |v| (p, v)))
            .collect();

        // Boot table: runtime page table nodes, runtime process and thread,
        // one endpoint per bound vector.
        let kernel_entries = u64::from(KERNEL_CAP_FRONT)
            + wide(runtime_pgtbl.len())
            + 2
            + wide(bound.len())
            + u64::from(self.project.kernel.extra_captbl);
        let kernel_slots = self.table_nodes(Scope::Kernel, kernel_entries)?;
        acct.open(Scope::Kernel, Frontier::new(KERNEL_CAP_FRONT, 0))?;
        let kernel_captbl = self.alloc_table(&mut acct, Scope::Kernel, "boot", &kernel_slots)?;
        let runtime_nodes = self.alloc_pgtbl(&mut acct, Scope::Kernel, "runtime", &runtime_pgtbl)?;
        let runtime_process = acct.allocate(
            Scope::Kernel,
            &Synthetic::new(ObjectKind::Process, "runtime"),
            g.process_size(),
        )?;
        let runtime_thread = acct.allocate(
            Scope::Kernel,
            &Synthetic::new(ObjectKind::Thread, "runtime init"),
            g.thread_size(),
        )?;
        let mut kernel_vectors = Vec::with_capacity(bound.len());
        for &(p, v) in &bound {
            let endpoint = acct.allocate(Scope::Kernel, &Promoted(v), g.endpoint_size())?;
            kernel_vectors.push(KernelVector {
                name: v.name.clone(),
                number: self.chip.vector(&v.name).map_or(0, |cv| cv.number),
                process: p.name.clone(),
                endpoint,
            });
        }
        let kernel_front = Self::check_table(&acct, Scope::Kernel, &kernel_slots)?;
        debug!(
            "boot table: {} nodes, front at cap {}, kmem {:#x}",
            kernel_slots.len(),
            kernel_front.cap,
            kernel_front.kmem
        );

        // Runtime table. Per process: local table, page table nodes, process object and
        // every runtime-visible object.
        let objects: usize = processes
            .iter()
            .map(|p| p.threads.len() + p.invocations.len() + p.receives.len() + p.vectors.len())
            .sum();
        let runtime_entries = u64::from(RUNTIME_CAP_FRONT)
            + 2 * wide(processes.len())
            + images.iter().map(|i| wide(i.pgtbl.len())).sum::<u64>()
            + wide(objects)
            + u64::from(self.project.runtime.extra_captbl);
        let runtime_slots = self.table_nodes(Scope::Runtime, runtime_entries)?;
        acct.open(Scope::Runtime, Frontier::new(RUNTIME_CAP_FRONT, kernel_front.kmem))?;
        let runtime_captbl =
            self.alloc_table(&mut acct, Scope::Runtime, "runtime", &runtime_slots)?;

        let mut remote = Vec::with_capacity(processes.len());
        for (p, local) in processes.iter().zip(&locals) {
            let node = Synthetic::new(ObjectKind::Captbl, format!("{} captbl", p.name));
            remote.push(acct.allocate(Scope::Runtime, &node, g.captbl_size(local.slots))?);
        }
        let mut pgtbls = Vec::with_capacity(processes.len());
        for (p, image) in processes.iter().zip(&images) {
            pgtbls.push(self.alloc_pgtbl(&mut acct, Scope::Runtime, &p.name, &image.pgtbl)?);
        }
        let mut process_caps = Vec::with_capacity(processes.len());
        for p in processes {
            let obj = Synthetic::new(ObjectKind::Process, p.name.as_str());
            process_caps.push(acct.allocate(Scope::Runtime, &obj, g.process_size())?);
        }
        let rt = Scope::Runtime;
        let mut threads = Vec::with_capacity(processes.len());
        for p in processes {
            threads.push(allocate_all(&mut acct, rt, &p.threads, g.thread_size())?);
        }
        let mut invocations = Vec::with_capacity(processes.len());
        for p in processes {
            invocations.push(allocate_all(&mut acct, rt, &p.invocations, g.invocation_size())?);
        }
        // Endpoints and vectors get a runtime slot of their own, independent
        // of any fixed local slot.
        let mut receives = Vec::with_capacity(processes.len());
        for p in processes {
            let promoted = p.receives.iter().map(|r| Promoted(r));
            receives.push(allocate_all(&mut acct, rt, promoted, g.endpoint_size())?);
        }
        let mut vectors = Vec::with_capacity(processes.len());
        for p in processes {
            let promoted = p.vectors.iter().map(|v| Promoted(v));
            vectors.push(allocate_all(&mut acct, rt, promoted, 0)?);
        }
        let runtime_front = Self::check_table(&acct, Scope::Runtime, &runtime_slots)?;

        let kmem = requests.kernel[4].section();
        if runtime_front.kmem > kmem.size {
            return Err(LayoutError::KmemExhausted {
                needed: runtime_front.kmem,
                available: kmem.size,
            });
        }
        info!(
            "kernel memory: {:#x} of {:#x} bytes used; runtime table front at cap {}",
            runtime_front.kmem, kmem.size, runtime_front.cap
        );

        let mut runtime_caps: Vec<RuntimeCaps> = Vec::with_capacity(processes.len());
        for ((((((captbl, pgtbl), process), threads), invocations), receives), vectors) in remote
            .into_iter()
            .zip(pgtbls)
            .zip(process_caps)
            .zip(threads)
            .zip(invocations)
            .zip(receives)
            .zip(vectors)
        {
            runtime_caps.push(RuntimeCaps {
                captbl,
                pgtbl,
                process,
                threads,
                invocations,
                receives,
                vectors,
            });
        }

        let kernel = KernelMap {
            code: requests.kernel[0].section(),
            data: requests.kernel[1].section(),
            stack: requests.kernel[2].section(),
            vector_flags: requests.kernel[3].section(),
            kmem,
            captbl: kernel_captbl,
            front: kernel_front,
            spans: acct.spans(Scope::Kernel).collect(),
            vectors: kernel_vectors,
        };
        let runtime = RuntimeMap {
            code: requests.runtime[0].section(),
            data: requests.runtime[1].section(),
            stack: requests.runtime[2].section(),
            pgtbl: PgtblMap {
                table: runtime_pgtbl,
                nodes: runtime_nodes,
            },
            process: runtime_process,
            thread: runtime_thread,
            captbl: runtime_captbl,
            spans: acct.spans(Scope::Runtime).collect(),
            front: runtime_front,
        };
        let processes = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| self.process_map(i, image, &locals, &runtime_caps, &kernel))
            .collect();

        Ok(Layout {
            platform: G::KIND,
            kernel,
            runtime,
            processes,
        })
    }

    fn process_map(
        &self,
        index: usize,
        image: ProcessImage,
        locals: &[LocalCaps],
        remote: &[RuntimeCaps],
        kernel: &KernelMap,
    ) -> ProcessMap {
        let decl = &self.project.processes[index];
        let local = &locals[index];
        let own = &remote[index];

        // Wiring was checked up front, so every lookup below succeeds.
        let target = |process: &str, pick: &dyn Fn(&ProcessDecl, &RuntimeCaps) -> Option<u32>| {
            self.project
                .process(process)
                .and_then(|(i, p)| pick(p, &remote[i]))
                .unwrap_or_default()
        };

        ProcessMap {
            name: decl.name.clone(),
            memory: image.memory,
            segments: image.segments,
            pgtbl: PgtblMap {
                table: image.pgtbl,
                nodes: own.pgtbl.clone(),
            },
            captbl: LocalTable {
                slots: local.slots,
                alloc: own.captbl,
            },
            process: own.process,
            threads: decl
                .threads
                .iter()
                .zip(&image.threads)
                .zip(&own.threads)
                .map(|((t, &(entry, stack)), &cap)| ThreadMap {
                    name: t.name.clone(),
                    entry,
                    stack,
                    priority: t.priority,
                    cap,
                })
                .collect(),
            invocations: decl
                .invocations
                .iter()
                .zip(&image.invocations)
                .zip(&own.invocations)
                .map(|((inv, &(entry, stack)), &cap)| InvocationMap {
                    name: inv.name.clone(),
                    entry,
                    stack,
                    cap,
                })
                .collect(),
            ports: decl
                .ports
                .iter()
                .zip(&local.ports)
                .map(|(port, &local)| PortMap {
                    name: port.name.clone(),
                    local,
                    process: port.process.clone(),
                    invocation: port.invocation.clone(),
                    target: target(&port.process, &|p, caps| {
                        let i = p.invocations.iter().position(|x| x.name == port.invocation)?;
                        caps.invocations.get(i).map(|a| a.cap)
                    }),
                })
                .collect(),
            receives: decl
                .receives
                .iter()
                .zip(&local.receives)
                .zip(&own.receives)
                .map(|((r, &local), &runtime)| ReceiveMap {
                    name: r.name.clone(),
                    local,
                    runtime,
                })
                .collect(),
            sends: decl
                .sends
                .iter()
                .zip(&local.sends)
                .map(|(send, &local)| SendMap {
                    name: send.name.clone(),
                    local,
                    process: send.process.clone(),
                    receive: send.receive.clone(),
                    target: target(&send.process, &|p, caps| {
                        let i = p.receives.iter().position(|x| x.name == send.receive)?;
                        caps.receives.get(i).map(|a| a.cap)
                    }),
                })
                .collect(),
            vectors: decl
                .vectors
                .iter()
                .zip(&local.vectors)
                .zip(&own.vectors)
                .map(|((v, &local), runtime)| {
                    let endpoint = kernel.vectors.iter().find(|k| k.name == v.name);
                    VectorMap {
                        name: v.name.clone(),
                        number: endpoint.map_or(0, |k| k.number),
                        local,
                        runtime: runtime.cap,
                        kernel: endpoint.map_or(0, |k| k.endpoint.cap),
                    }
                })
                .collect(),
        }
    }
}

/// Allocates every object of `objects` in `scope`, in order.
fn allocate_all<O: KernelObject>(
    acct: &mut Accountant,
    scope: Scope,
    objects: impl IntoIterator<Item = O>,
    footprint: u64,
) -> Result<Vec<Allocation>, FrontierError> {
    objects
        .into_iter()
        .map(|o| acct.allocate(scope, &o, footprint))
        .collect()
}

/// `usize` counts widened for slot arithmetic.
fn wide(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Hands out entry point addresses inside a process's first code segment.
struct EntryCursor<'a> {
    process: &'a str,
    code: Section,
    word: u64,
    /// Offset of the next auto entry into `code`.
    front: u64,
}

impl EntryCursor<'_> {
    fn place(&mut self, segs: &[Request], name: &str, place: Place) -> Result<u64, LayoutError> {
        let outside = |addr| LayoutError::EntryOutsideCode {
            process: self.process.to_owned(),
            name: name.to_owned(),
            addr,
        };

        match place {
            Place::Auto => {
                let addr = self.code.base + self.front;
                let front = self.front + ENTRY_SLOT_WORDS * self.word;
                if front > self.code.size {
                    return Err(outside(addr));
                }
                self.front = front;
                Ok(addr)
            }
            Place::Fixed(addr) => {
                let executable = segs.iter().any(|s| {
                    s.kind == RegionKind::Code
                        && s.req.attr.execute()
                        && s.section().contains(addr)
                });
                if executable { Ok(addr) } else { Err(outside(addr)) }
            }
        }
    }
}
