use std::{
    alloc::{GlobalAlloc, Layout},
    thread,
};

use tinyheap::{Config, DefaultConfig, GlobalTinyHeap};

fn leak_pool(len: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; len].into_boxed_slice())
}

#[test]
fn uninitialized() {
    let heap: GlobalTinyHeap<DefaultConfig> = GlobalTinyHeap::new();
    let layout = Layout::from_size_align(8, 1).unwrap();
    assert!(unsafe { heap.alloc(layout) }.is_null());
}

#[test]
fn alloc_dealloc() {
    let heap: GlobalTinyHeap<DefaultConfig> = GlobalTinyHeap::new();
    let capacity = unsafe { heap.init(leak_pool(1024)) };
    assert_eq!(heap.free_bytes(), Some(capacity));

    let layout = Layout::new::<[u64; 4]>();
    let mut ptrs = Vec::new();
    for i in 0..8 {
        let p = unsafe { heap.alloc(layout) };
        assert!(!p.is_null());
        assert_eq!(p as usize % layout.align(), 0);
        unsafe { p.cast::<[u64; 4]>().write([i; 4]) };
        ptrs.push(p);
    }

    for (i, &p) in ptrs.iter().enumerate() {
        unsafe {
            assert_eq!(p.cast::<[u64; 4]>().read(), [i as u64; 4]);
            heap.dealloc(p, layout);
        }
    }
    assert_eq!(heap.free_bytes(), Some(capacity));
    assert_eq!(heap.lock().regions().count(), 1);
}

#[test]
fn over_aligned_layout_fails() {
    let heap: GlobalTinyHeap<DefaultConfig> = GlobalTinyHeap::new();
    unsafe { heap.init(leak_pool(1024)) };

    let layout = Layout::from_size_align(8, DefaultConfig::ALIGN * 2).unwrap();
    assert!(unsafe { heap.alloc(layout) }.is_null());

    let layout = Layout::from_size_align(8, DefaultConfig::ALIGN).unwrap();
    assert!(!unsafe { heap.alloc(layout) }.is_null());
}

#[test]
fn cannot_alloc_max_usize_minus_some() {
    let heap: GlobalTinyHeap<DefaultConfig> = GlobalTinyHeap::new();
    unsafe { heap.init(leak_pool(1024)) };

    for offset in (0..64).step_by(8) {
        let layout = Layout::from_size_align(usize::MAX / 2 - offset, 1).unwrap();
        assert!(unsafe { heap.alloc(layout) }.is_null());
    }
    assert_eq!(heap.lock().regions().count(), 1);
}

#[cfg(not(target_arch = "wasm32"))]
#[test]
fn threads() {
    static HEAP: GlobalTinyHeap<DefaultConfig> = GlobalTinyHeap::new();
    let capacity = unsafe { HEAP.init(leak_pool(4096)) };

    let workers: Vec<_> = (0..4u8)
        .map(|id| {
            thread::spawn(move || {
                let layout = Layout::from_size_align(24, 1).unwrap();
                for _ in 0..1000 {
                    unsafe {
                        let p = HEAP.alloc(layout);
                        assert!(!p.is_null());
                        p.write_bytes(id, layout.size());
                        thread::yield_now();
                        assert!(std::slice::from_raw_parts(p, layout.size())
                            .iter()
                            .all(|&b| b == id));
                        HEAP.dealloc(p, layout);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(HEAP.free_bytes(), Some(capacity));
}
