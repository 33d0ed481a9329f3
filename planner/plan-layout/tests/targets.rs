use plan_layout::{Layout, LayoutError, plan};
use plan_memory::{MemAttr, Section, VirtualAddress};
use plan_model::{
    Chip, ChipVector, KernelDecl, MemReq, PlatformKind, ProcessDecl, Project, RuntimeDecl,
    Segment, ThreadDecl, VectorDecl,
};
use plan_platform::PlatformError;
use plan_region::{MemoryRegion, RegionKind};

fn thread(name: &str, stack_size: u64) -> ThreadDecl {
    ThreadDecl {
        name: name.into(),
        stack_size,
        ..ThreadDecl::default()
    }
}

/// Every section the layout placed, labelled.
fn sections(layout: &Layout) -> Vec<(String, Section)> {
    let k = &layout.kernel;
    let r = &layout.runtime;
    let mut all = vec![
        ("kernel code".to_owned(), k.code),
        ("kernel data".to_owned(), k.data),
        ("kernel stack".to_owned(), k.stack),
        ("vector flags".to_owned(), k.vector_flags),
        ("kernel memory".to_owned(), k.kmem),
        ("runtime code".to_owned(), r.code),
        ("runtime data".to_owned(), r.data),
        ("runtime stack".to_owned(), r.stack),
    ];
    for p in &layout.processes {
        for (i, s) in p.segments.iter().enumerate() {
            all.push((format!("{} segment {i}", p.name), s.section));
        }
    }
    all
}

fn assert_disjoint(layout: &Layout) {
    let all = sections(layout);
    for (i, (a, sa)) in all.iter().enumerate() {
        for (b, sb) in &all[i + 1..] {
            assert!(!sa.overlaps(sb), "{a} {sa} overlaps {b} {sb}");
        }
    }
}

mod armv7m {
    use super::*;

    fn chip() -> Chip {
        Chip::new("stm32f405", PlatformKind::A7M)
            .with_region(MemoryRegion::new(
                "flash",
                RegionKind::Code,
                0x0800_0000,
                0x10_0000,
                MemAttr::RX,
            ))
            .with_region(MemoryRegion::new(
                "sram",
                RegionKind::Data,
                0x2000_0000,
                0x2_0000,
                MemAttr::RW,
            ))
            .with_vector(ChipVector::new("USART1", 37))
    }

    fn project() -> Project {
        let mut app = ProcessDecl::new("app");
        app.segments.push(Segment::code(MemReq::auto(0x1000, MemAttr::RX)));
        app.segments.push(Segment::data(MemReq::auto(0x800, MemAttr::RW)));
        app.threads.push(thread("main", 0x200));
        app.vectors.push(VectorDecl {
            name: "USART1".into(),
            ..VectorDecl::default()
        });

        Project {
            name: "blinky".into(),
            kernel: KernelDecl {
                code: MemReq::fixed(0x0800_0000, 0x8000, MemAttr::RX),
                data: MemReq::auto(0x1000, MemAttr::RW),
                kmem: MemReq::auto(0x4000, MemAttr::RW),
                ..KernelDecl::default()
            },
            runtime: RuntimeDecl {
                code: MemReq::auto(0x4000, MemAttr::RX),
                data: MemReq::auto(0x1000, MemAttr::RW),
                ..RuntimeDecl::default()
            },
            processes: vec![app],
        }
    }

    #[test]
    fn auto_sections_are_naturally_aligned() {
        let layout = plan(&chip(), &project()).unwrap();
        assert_eq!(layout.platform, PlatformKind::A7M);
        assert_disjoint(&layout);

        assert_eq!(layout.kernel.stack, Section::new(0x2000_1000, 0x400));
        assert_eq!(layout.kernel.vector_flags, Section::new(0x2000_1400, 0x20));
        assert_eq!(layout.kernel.kmem, Section::new(0x2000_4000, 0x4000));
        assert_eq!(layout.runtime.code, Section::new(0x0800_8000, 0x4000));
        assert_eq!(layout.runtime.stack, Section::new(0x2000_1800, 0x800));

        for (what, s) in sections(&layout) {
            if what != "kernel code" {
                assert!(s.size.is_power_of_two(), "{what}");
                assert!(s.base.is_multiple_of(s.size), "{what}");
            }
        }
    }

    #[test]
    fn process_image() {
        let layout = plan(&chip(), &project()).unwrap();
        let app = layout.process("app").unwrap();

        assert_eq!(app.memory.code, Section::new(0x0800_C000, 0x1000));
        assert_eq!(app.memory.data, Section::new(0x2000_3000, 0x800));
        assert_eq!(app.threads[0].entry, 0x0800_C008);
        assert!(app.memory.data.encloses(app.threads[0].stack.base, 0x200));

        let table = &app.pgtbl.table;
        assert!(table.translate(VirtualAddress::new(0x0800_CFFC)).is_some());
        assert!(table.translate(VirtualAddress::new(0x0800_D000)).is_none());
        assert_eq!(table.mapped_bytes(), 0x1800);

        assert_eq!(app.vectors[0].number, 37);
        assert_eq!(app.vectors[0].local, 1);
        assert_eq!(layout.kernel.vectors[0].endpoint.cap, app.vectors[0].kernel);
    }

    #[test]
    fn mpu_region_budget() {
        let mut project = project();
        for i in 0..9 {
            let base = 0x2001_0000 + i * 0x1000;
            project.processes[0]
                .segments
                .push(Segment::data(MemReq::fixed(base, 0x20, MemAttr::RW)));
        }
        assert!(matches!(
            plan(&chip(), &project),
            Err(LayoutError::Platform(PlatformError::TooManyRegions {
                ref what,
                used: 11,
                limit: 8,
            })) if what == "app"
        ));

        let chip = chip().with_option("MPU_Regions", "16");
        let layout = plan(&chip, &project).unwrap();
        assert_eq!(layout.process("app").unwrap().segments.len(), 11);
    }

    #[test]
    fn same_input_same_layout() {
        let a = plan(&chip(), &project()).unwrap();
        let b = plan(&chip(), &project()).unwrap();
        assert_eq!(a, b);
    }
}

mod x86_64 {
    use super::*;

    fn chip() -> Chip {
        Chip::new("pc", PlatformKind::X64)
            .with_region(MemoryRegion::new(
                "image",
                RegionKind::Code,
                0x0010_0000,
                0x0F00_0000,
                MemAttr::RX,
            ))
            .with_region(MemoryRegion::new(
                "ram",
                RegionKind::Data,
                0x1000_0000,
                0x1000_0000,
                MemAttr::RW,
            ))
            .with_vector(ChipVector::new("com1", 36))
            .with_option("XSAVE_Size", "1024")
    }

    fn project() -> Project {
        let mut big = ProcessDecl::new("big");
        big.segments.push(Segment::code(MemReq::auto(0x1000, MemAttr::RX)));
        big.segments.push(Segment::data(
            MemReq::auto(0x20_0000, MemAttr::RW).with_align(0x20_0000),
        ));
        big.threads.push(thread("main", 0x1000));
        big.threads.push(thread("helper", 0x100));

        Project {
            name: "server".into(),
            kernel: KernelDecl {
                code: MemReq::fixed(0x0010_0000, 0x10_0000, MemAttr::RX),
                data: MemReq::auto(0x1_0000, MemAttr::RW),
                kmem: MemReq::auto(0x10_0000, MemAttr::RW),
                ..KernelDecl::default()
            },
            runtime: RuntimeDecl {
                code: MemReq::auto(0x1_0000, MemAttr::RX),
                data: MemReq::auto(0x1_0000, MemAttr::RW),
                ..RuntimeDecl::default()
            },
            processes: vec![big],
        }
    }

    #[test]
    fn large_pages_where_aligned() {
        let layout = plan(&chip(), &project()).unwrap();
        assert_eq!(layout.platform, PlatformKind::X64);
        assert_disjoint(&layout);

        let big = layout.process("big").unwrap();
        let data = big.memory.data;
        assert!(data.base.is_multiple_of(0x20_0000));
        assert!(
            big.pgtbl
                .table
                .leaves()
                .any(|l| l.order == 21 && l.virt.as_u64() == data.base)
        );

        // 8-byte words: two header words, then one per entry.
        assert_eq!(big.threads[0].entry, big.memory.code.base + 16);
        assert_eq!(big.threads[1].entry, big.memory.code.base + 24);
        for t in &big.threads {
            assert!(t.stack.base.is_multiple_of(16));
        }
    }

    #[test]
    fn thread_footprint_includes_xsave_area() {
        let layout = plan(&chip(), &project()).unwrap();
        let big = layout.process("big").unwrap();
        // Rounded up to the 32-byte kernel memory slot.
        let size = (38 * 8 + 1024_u64).next_multiple_of(32);
        assert_eq!(big.threads[0].cap.size, size);
        assert_eq!(layout.runtime.thread.size, size);
    }

    #[test]
    fn exception_vectors_are_rejected() {
        let chip = chip().with_vector(ChipVector::new("nmi", 2));
        assert!(matches!(
            plan(&chip, &project()),
            Err(LayoutError::Platform(PlatformError::VectorOutOfRange { number: 2, .. }))
        ));
    }
}
