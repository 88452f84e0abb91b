//! Global allocator.
//!
//! Macro graphs, parameter maps and decoded commands live on the heap. The
//! RP2040 core has no atomic compare-and-swap, so the allocator is guarded
//! by a critical section instead of a spinlock.

use core::alloc::{GlobalAlloc, Layout};
use core::cell::RefCell;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use critical_section::Mutex;
use linked_list_allocator::Heap;
use portable_atomic::{AtomicBool, Ordering};

pub const HEAP_SIZE: usize = 64 * 1024;

pub struct CriticalSectionHeap {
    heap: Mutex<RefCell<Heap>>,
}

impl CriticalSectionHeap {
    pub const fn empty() -> Self {
        Self {
            heap: Mutex::new(RefCell::new(Heap::empty())),
        }
    }

    /// Bytes currently allocated.
    pub fn used(&self) -> usize {
        critical_section::with(|cs| self.heap.borrow_ref(cs).used())
    }

    /// Bytes still available.
    pub fn free(&self) -> usize {
        critical_section::with(|cs| self.heap.borrow_ref(cs).free())
    }
}

unsafe impl GlobalAlloc for CriticalSectionHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        critical_section::with(|cs| {
            self.heap
                .borrow_ref_mut(cs)
                .allocate_first_fit(layout)
                .map_or(ptr::null_mut(), NonNull::as_ptr)
        })
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            critical_section::with(|cs| {
                // SAFETY: `ptr` came from `alloc` on this heap with `layout`.
                unsafe { self.heap.borrow_ref_mut(cs).deallocate(ptr, layout) }
            });
        }
    }
}

#[global_allocator]
pub static ALLOCATOR: CriticalSectionHeap = CriticalSectionHeap::empty();

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Hand the heap region to the allocator. Must run before anything
/// allocates; later calls do nothing.
pub fn init_heap() {
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];

    if INITIALIZED.swap(true, Ordering::AcqRel) {
        return;
    }
    critical_section::with(|cs| {
        // SAFETY: guarded by `INITIALIZED`, so the region is handed out once
        // and never touched through `HEAP_MEM` again.
        unsafe {
            let start = ptr::addr_of_mut!(HEAP_MEM).cast::<u8>();
            ALLOCATOR.heap.borrow_ref_mut(cs).init(start, HEAP_SIZE);
        }
    });
}
