//! Helpers shared by the integration tests.

use std::collections::BTreeMap;

use binsim::arch::Architecture;
use binsim::instruction::Instruction;
use binsim::operand::Operand;

/// Sections of a synthetic ELF32 image.
pub struct ElfSection {
    pub name: &'static str,
    pub address: u32,
    /// `None` describes a `.bss` style section of the given size.
    pub data: Option<Vec<u8>>,
    pub size: u32,
}

impl ElfSection {
    pub fn data(name: &'static str, address: u32, data: Vec<u8>) -> Self {
        let size = data.len() as u32;
        Self {
            name,
            address,
            data: Some(data),
            size,
        }
    }

    pub fn bss(name: &'static str, address: u32, size: u32) -> Self {
        Self {
            name,
            address,
            data: None,
            size,
        }
    }
}

const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHT_NOBITS: u32 = 8;
const SHF_WRITE: u32 = 1;
const SHF_ALLOC: u32 = 2;
const EHDR_SIZE: usize = 52;
const SHDR_SIZE: usize = 40;

/// Build a minimal 32-bit MIPS executable holding only section headers and section contents.
pub fn elf32(big_endian: bool, sections: &[ElfSection]) -> Vec<u8> {
    let u16_bytes = |value: u16| {
        if big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    };
    let u32_bytes = |value: u32| {
        if big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    };

    // Section name table
    let mut names = vec![0u8];
    let mut name_offsets = Vec::new();
    for section in sections.iter().map(|section| section.name).chain([".shstrtab"]) {
        name_offsets.push(names.len() as u32);
        names.extend_from_slice(section.as_bytes());
        names.push(0);
    }

    // Contents follow the file header
    let mut contents = Vec::new();
    let mut content_offsets = Vec::new();
    for section in sections {
        content_offsets.push((EHDR_SIZE + contents.len()) as u32);
        if let Some(data) = &section.data {
            contents.extend_from_slice(data);
        }
    }
    let names_offset = (EHDR_SIZE + contents.len()) as u32;
    contents.extend_from_slice(&names);
    while (EHDR_SIZE + contents.len()) % 4 != 0 {
        contents.push(0);
    }
    let section_headers_offset = (EHDR_SIZE + contents.len()) as u32;
    let num_sections = sections.len() + 2;

    let mut image = Vec::new();
    image.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, if big_endian { 2 } else { 1 }, 1, 0]);
    image.extend_from_slice(&[0; 8]);
    image.extend_from_slice(&u16_bytes(2)); // ET_EXEC
    image.extend_from_slice(&u16_bytes(8)); // EM_MIPS
    image.extend_from_slice(&u32_bytes(1));
    image.extend_from_slice(&u32_bytes(0)); // entry
    image.extend_from_slice(&u32_bytes(0)); // phoff
    image.extend_from_slice(&u32_bytes(section_headers_offset));
    image.extend_from_slice(&u32_bytes(0)); // flags
    image.extend_from_slice(&u16_bytes(EHDR_SIZE as u16));
    image.extend_from_slice(&u16_bytes(32));
    image.extend_from_slice(&u16_bytes(0));
    image.extend_from_slice(&u16_bytes(SHDR_SIZE as u16));
    image.extend_from_slice(&u16_bytes(num_sections as u16));
    image.extend_from_slice(&u16_bytes((num_sections - 1) as u16));
    assert_eq!(image.len(), EHDR_SIZE);
    image.extend_from_slice(&contents);

    let mut header = |name: u32, kind: u32, flags: u32, address: u32, offset: u32, size: u32| {
        for field in [name, kind, flags, address, offset, size, 0, 0, 1, 0] {
            image.extend_from_slice(&u32_bytes(field));
        }
    };

    header(0, 0, 0, 0, 0, 0);
    for (i, section) in sections.iter().enumerate() {
        let kind = if section.data.is_some() {
            SHT_PROGBITS
        } else {
            SHT_NOBITS
        };
        header(
            name_offsets[i],
            kind,
            SHF_ALLOC | SHF_WRITE,
            section.address,
            content_offsets[i],
            section.size,
        );
    }
    header(
        name_offsets[sections.len()],
        SHT_STRTAB,
        0,
        0,
        names_offset,
        names.len() as u32,
    );

    image
}

/// Decode a MIPS program placed back to back from `start`.
pub fn mips_program(
    start: u64,
    instructions: impl IntoIterator<Item = (&'static str, Vec<Operand>)>,
) -> binsim::Result<BTreeMap<u64, Instruction>> {
    let mut program = BTreeMap::new();
    for (i, (mnemonic, operands)) in instructions.into_iter().enumerate() {
        let instruction = Instruction::decode(Architecture::Mips, mnemonic, operands)?;
        program.insert(start + 4 * i as u64, instruction);
    }

    Ok(program)
}
