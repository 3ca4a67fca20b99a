//! EXIDX discovery from ELF headers mapped in the live process
//!
//! Each segment start is probed for an ELF header; program headers are then
//! read one entry at a time from the target, since the table is not assumed
//! to be mapped contiguously in our own memory.

use log::debug;
use object::elf::{FileHeader32, ProgramHeader32, PT_ARM_EXIDX};
use object::read::elf::{FileHeader, ProgramHeader};
use object::Endianness;
use std::mem::size_of;

use super::memory_maps::MemorySegment;
use crate::domain::Address;
use crate::process::RemoteMemory;

type Ehdr = FileHeader32<Endianness>;
type Phdr = ProgramHeader32<Endianness>;

/// Fill `exidx_start`/`exidx_end` for every segment that begins with an ELF
/// header carrying a `PT_ARM_EXIDX` program header.
pub fn scan_exidx(memory: &impl RemoteMemory, segments: &mut [MemorySegment]) {
    for segment in segments.iter_mut() {
        if let Some((start, end)) = find_exidx(memory, segment.start) {
            debug!("EXIDX for {}: {start} - {end}", segment.name);
            segment.exidx_start = start;
            segment.exidx_end = end;
        }
    }
}

/// Absolute EXIDX range of the ELF image mapped at `base`, first match wins
#[must_use]
pub fn find_exidx(memory: &impl RemoteMemory, base: Address) -> Option<(Address, Address)> {
    let header_bytes = memory.read_block(base, size_of::<Ehdr>())?;
    // Checks the magic, class and version
    let header = Ehdr::parse(header_bytes.as_slice()).ok()?;
    let endian = header.endian().ok()?;

    let table = base.wrapping_add(header.e_phoff(endian));
    let phnum = u32::from(header.e_phnum(endian));
    #[allow(clippy::cast_possible_truncation)]
    let entry_size = size_of::<Phdr>() as u32;

    for index in 0..phnum {
        let entry = table.wrapping_add(index.wrapping_mul(entry_size));
        let Some(bytes) = memory.read_block(entry, size_of::<Phdr>()) else {
            debug!("program header {index} at {entry} unreadable");
            continue;
        };
        let Ok((phdr, _)) = object::pod::from_bytes::<Phdr>(&bytes) else {
            continue;
        };
        if phdr.p_type(endian) == PT_ARM_EXIDX {
            let start = base.wrapping_add(phdr.p_offset(endian));
            let end = start.wrapping_add(phdr.p_filesz(endian));
            return Some((start, end));
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Byte image laid out at fixed addresses
    pub(crate) struct Image(pub HashMap<u32, u32>);

    impl Image {
        pub(crate) fn with_bytes(base: u32, bytes: &[u8]) -> Self {
            let mut words = HashMap::new();
            for (i, chunk) in bytes.chunks(4).enumerate() {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                words.insert(base + u32::try_from(i * 4).unwrap(), u32::from_le_bytes(word));
            }
            Self(words)
        }
    }

    impl RemoteMemory for Image {
        fn read_word(&self, addr: Address) -> Option<u32> {
            self.0.get(&addr.0).copied()
        }
    }

    fn phdr(p_type: u32, offset: u32, filesz: u32) -> Vec<u8> {
        let mut out = Vec::new();
        for field in [p_type, offset, 0, 0, filesz, filesz, 4, 4] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out
    }

    /// Minimal little-endian ELF32 header followed by `phdrs`
    pub(crate) fn elf_image(phdrs: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0x7f, b'E', b'L', b'F', 1, 1, 1, 0];
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&2u16.to_le_bytes()); // e_type
        out.extend_from_slice(&40u16.to_le_bytes()); // e_machine
        out.extend_from_slice(&1u32.to_le_bytes()); // e_version
        out.extend_from_slice(&0u32.to_le_bytes()); // e_entry
        out.extend_from_slice(&52u32.to_le_bytes()); // e_phoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&52u16.to_le_bytes()); // e_ehsize
        out.extend_from_slice(&32u16.to_le_bytes()); // e_phentsize
        out.extend_from_slice(&u16::try_from(phdrs.len()).unwrap().to_le_bytes());
        out.extend_from_slice(&[0; 6]); // e_shentsize, e_shnum, e_shstrndx
        assert_eq!(out.len(), 52);
        for p in phdrs {
            out.extend_from_slice(p);
        }
        out
    }

    #[test]
    fn test_finds_exidx_after_other_headers() {
        let bytes = elf_image(&[phdr(1, 0, 0x1000), phdr(PT_ARM_EXIDX, 0x800, 0x40)]);
        let image = Image::with_bytes(0x8000, &bytes);
        let found = find_exidx(&image, Address(0x8000));
        assert_eq!(found, Some((Address(0x8800), Address(0x8840))));
    }

    #[test]
    fn test_first_exidx_wins() {
        let bytes =
            elf_image(&[phdr(PT_ARM_EXIDX, 0x100, 0x10), phdr(PT_ARM_EXIDX, 0x200, 0x20)]);
        let image = Image::with_bytes(0x1_0000, &bytes);
        assert_eq!(
            find_exidx(&image, Address(0x1_0000)),
            Some((Address(0x1_0100), Address(0x1_0110)))
        );
    }

    #[test]
    fn test_no_exidx_leaves_defaults() {
        let bytes = elf_image(&[phdr(1, 0, 0x1000)]);
        let image = Image::with_bytes(0x8000, &bytes);
        let mut segments = vec![MemorySegment::new(Address(0x8000), Address(0x9000), "/bin/app")];
        scan_exidx(&image, &mut segments);
        assert_eq!(segments[0].exidx_start, Address(0));
        assert_eq!(segments[0].exidx_end, Address(0));
    }

    #[test]
    fn test_bad_magic_and_unreadable_segments_skipped() {
        let mut bytes = elf_image(&[phdr(PT_ARM_EXIDX, 0x100, 0x10)]);
        bytes[1] = b'X';
        let image = Image::with_bytes(0x8000, &bytes);
        assert_eq!(find_exidx(&image, Address(0x8000)), None);
        assert_eq!(find_exidx(&image, Address(0x4000_0000)), None);
    }

    #[test]
    fn test_scan_fills_segment() {
        let bytes = elf_image(&[phdr(PT_ARM_EXIDX, 0x400, 0x80)]);
        let image = Image::with_bytes(0x8000, &bytes);
        let mut segments = vec![MemorySegment::new(Address(0x8000), Address(0x9000), "/bin/app")];
        scan_exidx(&image, &mut segments);
        assert!(segments[0].has_exidx());
        assert_eq!(segments[0].exidx_start, Address(0x8400));
        assert_eq!(segments[0].exidx_end, Address(0x8480));
    }
}
