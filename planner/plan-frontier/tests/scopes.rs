//! Interleaved scopes with kinds allocated in creation order.

use plan_frontier::{
    Accountant, CapRequest, Frontier, KernelObject, ObjectKind, Promoted, Scope, Synthetic,
};

struct Endpoint {
    name: String,
    cap: CapRequest,
}

impl KernelObject for Endpoint {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Receive
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn cap_request(&self) -> CapRequest {
        self.cap
    }
}

#[test]
fn auto_indices_are_gap_free_per_kind() {
    let mut acct = Accountant::new(4);
    acct.open(Scope::Runtime, Frontier::new(8, 0x40)).unwrap();

    let mut expected_kmem = 0x40;
    for (i, kind) in ObjectKind::ALL.into_iter().enumerate() {
        let count = i % 4 + 1;
        let mut caps = Vec::new();
        for n in 0..count {
            let footprint = (n as u64 + 1) * 24;
            let a = acct
                .allocate(Scope::Runtime, &Synthetic::new(kind, format!("{kind}{n}")), footprint)
                .unwrap();
            assert_eq!(a.kmem, expected_kmem);
            expected_kmem += footprint.next_multiple_of(16);
            caps.push(a.cap);
        }
        assert!(caps.windows(2).all(|w| w[1] == w[0] + 1), "{kind}: {caps:?}");

        let span = acct.span(Scope::Runtime, kind).unwrap();
        assert_eq!(span.cap_front - span.cap_base, count as u32);
        assert_eq!(span.count, count as u32);
    }

    // Spans tile the scope without gaps.
    let spans: Vec<_> = acct.spans(Scope::Runtime).collect();
    assert_eq!(spans.len(), ObjectKind::ALL.len());
    for pair in spans.windows(2) {
        assert_eq!(pair[0].1.cap_front, pair[1].1.cap_base);
        assert_eq!(pair[0].1.kmem_front, pair[1].1.kmem_base);
    }
    assert_eq!(acct.front(Scope::Runtime).map(|f| f.kmem), Some(expected_kmem));
}

#[test]
fn process_and_runtime_indices_are_independent() {
    let mut acct = Accountant::new(4);
    acct.open(Scope::Process(0), Frontier::new(1, 0)).unwrap();
    acct.open(Scope::Process(1), Frontier::new(1, 0)).unwrap();
    acct.open(Scope::Runtime, Frontier::new(8, 0)).unwrap();

    let endpoints: Vec<_> = [
        ("a", CapRequest::Auto),
        ("b", CapRequest::Fixed(5)),
        ("c", CapRequest::Auto),
    ]
    .into_iter()
    .map(|(name, cap)| Endpoint {
        name: name.into(),
        cap,
    })
    .collect();

    let local: Vec<_> = endpoints
        .iter()
        .map(|e| acct.allocate(Scope::Process(0), e, 0).unwrap().cap)
        .collect();
    assert_eq!(local, [1, 5, 6]);

    // Same declarations in another process start from that process's front.
    let other = acct.allocate(Scope::Process(1), &endpoints[0], 0).unwrap();
    assert_eq!(other.cap, 1);

    let global: Vec<_> = endpoints
        .iter()
        .map(|e| acct.allocate(Scope::Runtime, &Promoted(e), 48).unwrap())
        .map(|a| (a.cap, a.kmem))
        .collect();
    assert_eq!(global, [(8, 0), (9, 48), (10, 96)]);
}
