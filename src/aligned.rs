use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Alignment of every buffer handed to the SIMD kernels (one cache line, covers AVX-512 width).
pub const ALIGNMENT: usize = 64;

/// Zero-initialized, fixed-length, `ALIGNMENT`-aligned buffer of plain numeric values.
pub struct AlignedVec<T: Copy> {
    ptr: NonNull<T>,
    len: usize,
    _owns: PhantomData<T>,
}

// The buffer is uniquely owned plain data.
unsafe impl<T: Copy + Send> Send for AlignedVec<T> {}
unsafe impl<T: Copy + Sync> Sync for AlignedVec<T> {}

impl<T: Copy> AlignedVec<T> {
    /// Allocates `len` zeroed elements. Only use with types for which all-zero bytes is a valid value.
    pub fn zeroed(len: usize) -> Self {
        let layout = Self::layout(len);
        if layout.size() == 0 {
            return Self { ptr: NonNull::dangling(), len, _owns: PhantomData };
        }
        let raw = unsafe { alloc::alloc_zeroed(layout) } as *mut T;
        let ptr = match NonNull::new(raw) {
            Some(p) => p,
            None => alloc::handle_alloc_error(layout),
        };
        Self { ptr, len, _owns: PhantomData }
    }

    pub fn from_slice(values: &[T]) -> Self {
        let mut v = Self::zeroed(values.len());
        v.copy_from_slice(values);
        v
    }

    fn layout(len: usize) -> Layout {
        let size = std::mem::size_of::<T>().checked_mul(len).expect("aligned buffer size overflow");
        Layout::from_size_align(size, ALIGNMENT.max(std::mem::align_of::<T>())).expect("aligned buffer layout")
    }

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn as_slice(&self) -> &[T] { self }
    pub fn as_mut_slice(&mut self) -> &mut [T] { self }
}

impl<T: Copy> Deref for AlignedVec<T> {
    type Target = [T];
    fn deref(&self) -> &[T] { unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) } }
}

impl<T: Copy> DerefMut for AlignedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] { unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) } }
}

impl<T: Copy> Drop for AlignedVec<T> {
    fn drop(&mut self) {
        let layout = Self::layout(self.len);
        if layout.size() != 0 {
            unsafe { alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout) };
        }
    }
}

impl<T: Copy> Clone for AlignedVec<T> {
    fn clone(&self) -> Self { Self::from_slice(self) }
}

impl<T: Copy + fmt::Debug> fmt::Debug for AlignedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_list().entries(self.iter()).finish() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_and_aligned() {
        let v: AlignedVec<f32> = AlignedVec::zeroed(100);
        assert_eq!(v.len(), 100);
        assert!(v.iter().all(|&x| x == 0.0));
        assert_eq!(v.as_ptr() as usize % ALIGNMENT, 0);
    }

    #[test]
    fn empty_buffer() {
        let v: AlignedVec<i8> = AlignedVec::zeroed(0);
        assert!(v.is_empty());
        assert_eq!(v.as_slice(), &[] as &[i8]);
    }

    #[test]
    fn clone_copies_contents() {
        let mut v: AlignedVec<i32> = AlignedVec::zeroed(4);
        v.copy_from_slice(&[1, 2, 3, 4]);
        let w = v.clone();
        assert_eq!(&w[..], &[1, 2, 3, 4]);
    }
}
