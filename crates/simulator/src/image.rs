use std::path::Path;

use elf::abi::{SHF_ALLOC, SHT_NOBITS};
use elf::endian::AnyEndian;
use elf::ElfBytes;

/// Image result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse ELF image: {0}")]
    Parse(#[from] elf::ParseError),
}

/// Index of a section within a [StaticImage].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionId(pub usize);

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of the initialized data of the binary being simulated.
pub trait StaticImage {
    /// The section containing the given virtual address, if any.
    fn section_index_for(&self, offset: u64) -> Option<SectionId>;

    /// The byte at the given virtual address of a section.
    fn byte_at(&self, section: SectionId, offset: u64) -> Option<u8>;

    /// Byte at a virtual address, resolved through its containing section.
    fn read_byte(&self, offset: u64) -> Option<u8> {
        self.section_index_for(offset)
            .and_then(|section| self.byte_at(section, offset))
    }
}

/// A contiguous range of the image. Bytes past the end of `data` but within `size` read as zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub data: Vec<u8>,
}

impl Section {
    pub fn new(name: impl Into<String>, address: u64, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            address,
            size: data.len() as u64,
            data,
        }
    }

    /// A section without file contents, such as `.bss`.
    pub fn zeroed(name: impl Into<String>, address: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            address,
            size,
            data: Vec::new(),
        }
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.address && offset - self.address < self.size
    }

    fn byte(&self, offset: u64) -> Option<u8> {
        if !self.contains(offset) {
            return None;
        }

        let index = usize::try_from(offset - self.address).ok()?;
        Some(self.data.get(index).copied().unwrap_or(0))
    }
}

/// In-memory image made of a list of sections.
#[derive(Clone, Debug, Default)]
pub struct SectionImage {
    sections: Vec<Section>,
}

impl SectionImage {
    pub fn new(sections: impl IntoIterator<Item = Section>) -> Self {
        Self {
            sections: sections.into_iter().collect(),
        }
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }
}

impl StaticImage for SectionImage {
    fn section_index_for(&self, offset: u64) -> Option<SectionId> {
        self.sections
            .iter()
            .position(|section| section.contains(offset))
            .map(SectionId)
    }

    fn byte_at(&self, section: SectionId, offset: u64) -> Option<u8> {
        self.section(section)?.byte(offset)
    }
}

/// Image built from the allocated sections of an ELF file.
#[derive(Clone, Debug)]
pub struct ElfImage {
    sections: SectionImage,
    big_endian: bool,
}

impl ElfImage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let file = ElfBytes::<AnyEndian>::minimal_parse(data)?;
        let (headers, strings) = file.section_headers_with_strtab()?;

        let mut sections = Vec::new();
        for header in headers.iter().flat_map(|headers| headers.iter()) {
            if header.sh_flags & (SHF_ALLOC as u64) == 0 || header.sh_size == 0 {
                continue;
            }

            let name = match &strings {
                Some(strings) => strings.get(header.sh_name as usize)?.to_string(),
                None => String::new(),
            };

            let section = if header.sh_type == SHT_NOBITS {
                Section::zeroed(name, header.sh_addr, header.sh_size)
            } else {
                let (data, _) = file.section_data(&header)?;
                Section {
                    name,
                    address: header.sh_addr,
                    size: header.sh_size,
                    data: data.to_vec(),
                }
            };

            tracing::trace!(
                target: "binsim::image",
                section = %section.name,
                address = section.address,
                size = section.size
            );
            sections.push(section);
        }

        Ok(Self {
            sections: SectionImage::new(sections),
            big_endian: matches!(file.ehdr.endianness, AnyEndian::Big),
        })
    }

    pub fn sections(&self) -> &[Section] {
        self.sections.sections()
    }

    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }
}

impl StaticImage for ElfImage {
    fn section_index_for(&self, offset: u64) -> Option<SectionId> {
        self.sections.section_index_for(offset)
    }

    fn byte_at(&self, section: SectionId, offset: u64) -> Option<u8> {
        self.sections.byte_at(section, offset)
    }
}
