use std::collections::BTreeMap;

use sim_value::{Address, Literal, RegionId, Value, Width};

use crate::config::Endianness;
use crate::diagnostics::DiagnosticLog;
use crate::error::ErrorClass;
use crate::image::StaticImage;

/// Memory result type
pub type Result<T> = std::result::Result<T, Error>;

/// Possible memory errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The address declares a different region than the one accessed.
    #[error("address {address} does not belong to region {region}")]
    RegionMismatch { region: RegionId, address: Address },

    /// There is no data defined at a particular address
    #[error("data not defined at {address} + {relative_offset}")]
    UndefinedData {
        address: Address,
        relative_offset: usize,
    },

    #[error("region {region} has been freed")]
    Freed { region: RegionId },

    #[error("access of {size} byte(s) at {address} exceeds buffer size {buffer_size}")]
    OutOfBounds {
        address: Address,
        size: usize,
        buffer_size: usize,
    },

    #[error("buffer size of region {region} is not known")]
    UnknownBufferSize { region: RegionId },

    /// The address is not backed by readable or writable memory.
    #[error("address {address} cannot be dereferenced")]
    NotDereferenceable { address: Address },

    /// The value has no byte representation, such as an undecided comparison.
    #[error("value {value} cannot be stored in memory")]
    UnstorableValue { value: String },

    #[error("invalid patch {address} = {value}")]
    InvalidPatch { address: String, value: String },
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UndefinedData { .. } => ErrorClass::UninitializedAccess,
            Error::RegionMismatch { .. }
            | Error::Freed { .. }
            | Error::OutOfBounds { .. }
            | Error::UnknownBufferSize { .. }
            | Error::NotDereferenceable { .. } => ErrorClass::InvalidRegion,
            Error::UnstorableValue { .. } => ErrorClass::SymbolicEscalation,
            Error::InvalidPatch { .. } => ErrorClass::Structural,
        }
    }
}

/// A byte stored in memory. Bytes of values without concrete bits are stored as fragments of the
/// original value so that reading the value back whole reproduces it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryByte {
    Concrete(u8),

    /// Byte of the given significance of a non-literal value, where `0` is the least significant.
    Fragment { value: Value, index: usize },
}

/// Split a value into bytes in memory order.
pub fn value_to_bytes(value: &Value, endianness: Endianness) -> Result<Vec<MemoryByte>> {
    let mut bytes: Vec<MemoryByte> = match value {
        Value::Literal(literal) => literal.into_le_bytes().map(MemoryByte::Concrete).collect(),
        Value::Address(_) | Value::Symbol(_) => {
            let num_bytes = value.num_bytes().unwrap_or_default();
            (0..num_bytes)
                .map(|index| MemoryByte::Fragment {
                    value: value.clone(),
                    index,
                })
                .collect()
        }
        Value::UndefinedBoolean => {
            return Err(Error::UnstorableValue {
                value: value.to_string(),
            })
        }
    };

    if endianness.is_big() {
        bytes.reverse();
    }

    Ok(bytes)
}

/// Reassemble bytes in memory order into a value. The `address` only names the value when the
/// bytes cannot be combined.
pub fn bytes_to_value(
    mut bytes: Vec<MemoryByte>,
    endianness: Endianness,
    address: &Address,
) -> Value {
    let size = bytes.len();
    let width = Width::from_bytes(size).unwrap_or(Width::W64);
    if endianness.is_big() {
        bytes.reverse();
    }

    let concrete = bytes
        .iter()
        .map(|byte| match byte {
            MemoryByte::Concrete(byte) => Some(*byte),
            MemoryByte::Fragment { .. } => None,
        })
        .collect::<Option<Vec<u8>>>();

    if let Some(literal) = concrete.and_then(|bytes| Literal::from_le_bytes(&bytes)) {
        return Value::Literal(literal);
    }

    // Fragments of a single value in order starting at its least significant byte
    if let Some(MemoryByte::Fragment { value, .. }) = bytes.first() {
        let in_order = bytes.iter().enumerate().all(|(i, byte)| {
            matches!(byte, MemoryByte::Fragment { value: v, index } if v == value && *index == i)
        });

        if in_order {
            if value.num_bytes() == Some(size) {
                return value.clone();
            }

            if let Ok(truncated) = value.truncate(width) {
                return truncated;
            }
        }
    }

    Value::symbol(format!("bytes({address}, {size})"), width)
}

/// Sparse byte storage for a single region. Modelled on a sorted map keyed by offset.
#[derive(Clone, Debug)]
pub struct ByteMemory {
    region: RegionId,
    endianness: Endianness,
    data: BTreeMap<i64, MemoryByte>,
}

impl ByteMemory {
    pub fn new(region: RegionId, endianness: Endianness) -> Self {
        Self {
            region,
            endianness,
            data: Default::default(),
        }
    }

    pub fn region(&self) -> &RegionId {
        &self.region
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Fail if the address declares a different region.
    pub fn check_region(&self, address: &Address) -> Result<()> {
        if address.region() == &self.region {
            Ok(())
        } else {
            Err(Error::RegionMismatch {
                region: self.region.clone(),
                address: address.clone(),
            })
        }
    }

    pub fn is_defined(&self, offset: i64) -> bool {
        self.data.contains_key(&offset)
    }

    /// Offsets of the span that have never been written.
    pub fn undefined_offsets(&self, address: &Address, size: usize) -> Vec<i64> {
        span(address, size)
            .filter(|offset| !self.is_defined(*offset))
            .collect()
    }

    pub fn read_bytes(&self, address: &Address, size: usize) -> Result<Vec<MemoryByte>> {
        self.check_region(address)?;
        span(address, size)
            .enumerate()
            .map(|(i, offset)| {
                self.data
                    .get(&offset)
                    .cloned()
                    .ok_or_else(|| Error::UndefinedData {
                        address: address.clone(),
                        relative_offset: i,
                    })
            })
            .collect()
    }

    pub fn write_bytes(&mut self, address: &Address, bytes: Vec<MemoryByte>) -> Result<()> {
        self.check_region(address)?;
        for (offset, byte) in span(address, bytes.len()).zip(bytes) {
            self.data.insert(offset, byte);
        }

        Ok(())
    }

    pub fn read(&self, address: &Address, size: usize) -> Result<Value> {
        let bytes = self.read_bytes(address, size)?;
        Ok(bytes_to_value(bytes, self.endianness, address))
    }

    pub fn write(&mut self, address: &Address, value: &Value) -> Result<()> {
        let bytes = value_to_bytes(value, self.endianness)?;
        self.write_bytes(address, bytes)
    }

    /// Store zero in every undefined byte of the span. Returns whether any byte was written.
    fn materialize_zeros(&mut self, address: &Address, size: usize) -> bool {
        let undefined = self.undefined_offsets(address, size);
        for offset in &undefined {
            self.data.insert(*offset, MemoryByte::Concrete(0));
        }

        !undefined.is_empty()
    }
}

fn span(address: &Address, size: usize) -> impl Iterator<Item = i64> {
    let start = address.offset();
    (0..size as i64).map(move |i| start.wrapping_add(i))
}

/// Common contract of the memory regions of a simulation state.
pub trait MemoryRegion {
    fn id(&self) -> &RegionId;

    /// Read `size` bytes at `address` on behalf of the instruction at `iaddr`.
    fn get(
        &mut self,
        log: &mut DiagnosticLog,
        iaddr: u64,
        address: &Address,
        size: usize,
    ) -> Result<Value>;

    /// Write `value` at `address` and describe the effect.
    fn set(
        &mut self,
        log: &mut DiagnosticLog,
        iaddr: u64,
        address: &Address,
        value: &Value,
    ) -> Result<String>;
}

fn describe_store(address: &Address, value: &Value) -> String {
    format!("{address} := {value}")
}

/// Seeds the stack with the process environment the first time it is accessed.
pub trait StackEnvironment: std::fmt::Debug {
    fn initialize(&self, stack: &mut ByteMemory) -> Result<()>;
}

/// Places NUL terminated strings contiguously above the initial stack pointer.
#[derive(Clone, Debug, Default)]
pub struct EnvironmentStrings {
    offset: i64,
    strings: Vec<String>,
}

impl EnvironmentStrings {
    /// Offset from the initial stack pointer where the first string is placed.
    pub const DEFAULT_OFFSET: i64 = 0x400;

    pub fn new(strings: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            offset: Self::DEFAULT_OFFSET,
            strings: strings.into_iter().map(Into::into).collect(),
        }
    }

    pub fn at_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Stack addresses of each string, in order.
    pub fn addresses(&self) -> Vec<Address> {
        let mut offset = self.offset;
        self.strings
            .iter()
            .map(|string| {
                let address = Address::stack(offset);
                offset += string.len() as i64 + 1;
                address
            })
            .collect()
    }
}

impl StackEnvironment for EnvironmentStrings {
    fn initialize(&self, stack: &mut ByteMemory) -> Result<()> {
        for (address, string) in self.addresses().iter().zip(&self.strings) {
            let bytes = string
                .bytes()
                .chain(std::iter::once(0))
                .map(MemoryByte::Concrete)
                .collect();
            stack.write_bytes(address, bytes)?;
        }

        Ok(())
    }
}

/// The stack of the simulated process. Addresses are offsets from the initial stack pointer.
#[derive(Debug)]
pub struct StackMemory {
    memory: ByteMemory,
    environment: Option<Box<dyn StackEnvironment>>,
    initialized: bool,
}

impl StackMemory {
    pub fn new(endianness: Endianness) -> Self {
        Self {
            memory: ByteMemory::new(RegionId::Stack, endianness),
            environment: None,
            initialized: false,
        }
    }

    pub fn with_environment(mut self, environment: impl StackEnvironment + 'static) -> Self {
        self.environment = Some(Box::new(environment));
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn memory(&self) -> &ByteMemory {
        &self.memory
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.initialized = true;
        if let Some(environment) = &self.environment {
            environment.initialize(&mut self.memory)?;
        }

        Ok(())
    }
}

impl MemoryRegion for StackMemory {
    fn id(&self) -> &RegionId {
        self.memory.region()
    }

    fn get(
        &mut self,
        log: &mut DiagnosticLog,
        _iaddr: u64,
        address: &Address,
        size: usize,
    ) -> Result<Value> {
        self.memory.check_region(address)?;
        self.initialize()?;

        if self.memory.materialize_zeros(address, size) {
            log.add("stack memory", format!("{address} uninitialized ({size} bytes)"));
        }

        self.memory.read(address, size)
    }

    fn set(
        &mut self,
        _log: &mut DiagnosticLog,
        _iaddr: u64,
        address: &Address,
        value: &Value,
    ) -> Result<String> {
        self.memory.check_region(address)?;
        self.initialize()?;
        self.memory.write(address, value)?;
        Ok(describe_store(address, value))
    }
}

/// Global data of the simulated process. Bytes are materialized from the static image on first
/// read; user patches take precedence over the image.
pub struct GlobalMemory {
    memory: ByteMemory,
    image: Box<dyn StaticImage>,
    patch_source: BTreeMap<String, String>,
    patches: Option<BTreeMap<u64, Literal>>,
    accesses: BTreeMap<u64, Vec<String>>,
}

impl std::fmt::Debug for GlobalMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalMemory")
            .field("memory", &self.memory)
            .field("patches", &self.patches)
            .field("accesses", &self.accesses)
            .finish_non_exhaustive()
    }
}

impl GlobalMemory {
    pub fn new(endianness: Endianness, image: impl StaticImage + 'static) -> Self {
        Self::with_boxed_image(endianness, Box::new(image))
    }

    pub fn with_boxed_image(endianness: Endianness, image: Box<dyn StaticImage>) -> Self {
        Self {
            memory: ByteMemory::new(RegionId::Global, endianness),
            image,
            patch_source: Default::default(),
            patches: None,
            accesses: Default::default(),
        }
    }

    /// Replace 4-byte values at the given addresses. Both keys and values are hexadecimal strings
    /// and are parsed on first use.
    pub fn with_patched_globals(mut self, patches: BTreeMap<String, String>) -> Self {
        self.patch_source = patches;
        self.patches = None;
        self
    }

    /// History of resolved reads per address, formatted as `instruction-address:value`.
    pub fn accesses(&self) -> &BTreeMap<u64, Vec<String>> {
        &self.accesses
    }

    pub fn memory(&self) -> &ByteMemory {
        &self.memory
    }

    fn patches(&mut self) -> Result<&BTreeMap<u64, Literal>> {
        if self.patches.is_none() {
            let parsed = self
                .patch_source
                .iter()
                .map(|(address, value)| -> Result<(u64, Literal)> {
                    let invalid = || Error::InvalidPatch {
                        address: address.clone(),
                        value: value.clone(),
                    };
                    let offset = parse_hex(address).ok_or_else(invalid)?;
                    let bits = parse_hex(value)
                        .filter(|bits| *bits <= u64::from(u32::MAX))
                        .ok_or_else(invalid)?;
                    Ok((offset, Literal::new(bits, Width::W32)))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            self.patches = Some(parsed);
        }

        Ok(self.patches.get_or_insert_with(Default::default))
    }

    /// Byte at `offset` supplied by a patch, in the byte order of the region. A patch covers the
    /// four bytes starting at its address.
    fn patched_byte(&mut self, offset: u64) -> Result<Option<MemoryByte>> {
        let endianness = self.memory.endianness();
        let Some((&start, &patch)) = self.patches()?.range(..=offset).next_back() else {
            return Ok(None);
        };

        let index = (offset - start) as usize;
        if index >= patch.num_bytes() {
            return Ok(None);
        }

        let mut bytes = value_to_bytes(&Value::Literal(patch), endianness)?;
        Ok(Some(bytes.swap_remove(index)))
    }

    /// Fill undefined bytes of the span from the patch table. Returns whether the whole span is
    /// defined afterwards.
    fn apply_patches(&mut self, address: &Address, size: usize) -> Result<bool> {
        for offset in self.memory.undefined_offsets(address, size) {
            if let Some(byte) = self.patched_byte(offset as u64)? {
                self.memory.data.insert(offset, byte);
            }
        }

        Ok(self.memory.undefined_offsets(address, size).is_empty())
    }

    fn record_access(&mut self, iaddr: u64, address: &Address, value: &Value) {
        self.accesses
            .entry(address.offset() as u64)
            .or_default()
            .push(format!("{iaddr:#x}:{value}"));
    }

    fn from_image(
        &mut self,
        log: &mut DiagnosticLog,
        address: &Address,
        size: usize,
    ) -> Result<Value> {
        let mapped = self
            .image
            .section_index_for(address.offset() as u64)
            .is_some();

        // Bytes outside any section read as zero
        for offset in self.memory.undefined_offsets(address, size) {
            let byte = self.image.read_byte(offset as u64).unwrap_or(0);
            self.memory.data.insert(offset, MemoryByte::Concrete(byte));
        }

        if mapped {
            log.add("global memory", format!("{address} uninitialized"));
        } else {
            log.add(
                "global memory",
                format!("{address} uninitialized (not in image)"),
            );
        }

        self.memory.read(address, size)
    }
}

fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

impl MemoryRegion for GlobalMemory {
    fn id(&self) -> &RegionId {
        self.memory.region()
    }

    fn get(
        &mut self,
        log: &mut DiagnosticLog,
        iaddr: u64,
        address: &Address,
        size: usize,
    ) -> Result<Value> {
        self.memory.check_region(address)?;

        let value = if let Ok(value) = self.memory.read(address, size) {
            value
        } else if self.apply_patches(address, size)? {
            self.memory.read(address, size)?
        } else {
            self.from_image(log, address, size)?
        };

        self.record_access(iaddr, address, &value);
        Ok(value)
    }

    fn set(
        &mut self,
        _log: &mut DiagnosticLog,
        _iaddr: u64,
        address: &Address,
        value: &Value,
    ) -> Result<String> {
        self.memory.write(address, value)?;
        Ok(describe_store(address, value))
    }
}

/// Whether a dynamically allocated region may still be accessed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionStatus {
    Valid,
    Freed,
}

/// A dynamically allocated buffer. Failed reads produce a symbol describing the failure so the
/// run can continue; failed writes are errors.
#[derive(Clone, Debug)]
pub struct BaseMemory {
    memory: ByteMemory,
    buffer_size: Option<usize>,
    status: RegionStatus,
}

impl BaseMemory {
    pub fn new(name: impl Into<String>, endianness: Endianness, buffer_size: Option<usize>) -> Self {
        Self {
            memory: ByteMemory::new(RegionId::Base(name.into()), endianness),
            buffer_size,
            status: RegionStatus::Valid,
        }
    }

    pub fn name(&self) -> &str {
        match self.memory.region() {
            RegionId::Base(name) => name,
            _ => "",
        }
    }

    pub fn free(&mut self) {
        self.status = RegionStatus::Freed;
    }

    pub fn status(&self) -> RegionStatus {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status == RegionStatus::Valid
    }

    pub fn has_buffer_size(&self) -> bool {
        self.buffer_size.is_some()
    }

    pub fn buffer_size(&self) -> Result<usize> {
        self.buffer_size.ok_or_else(|| Error::UnknownBufferSize {
            region: self.memory.region().clone(),
        })
    }

    /// Fail if the region is freed or the access falls outside the declared buffer.
    fn check_access(&self, address: &Address, size: usize) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::Freed {
                region: self.memory.region().clone(),
            });
        }

        if let Some(buffer_size) = self.buffer_size {
            let in_bounds = usize::try_from(address.offset())
                .ok()
                .and_then(|offset| offset.checked_add(size))
                .is_some_and(|end| end <= buffer_size);

            if !in_bounds {
                return Err(Error::OutOfBounds {
                    address: address.clone(),
                    size,
                    buffer_size,
                });
            }
        }

        Ok(())
    }
}

impl MemoryRegion for BaseMemory {
    fn id(&self) -> &RegionId {
        self.memory.region()
    }

    fn get(
        &mut self,
        _log: &mut DiagnosticLog,
        _iaddr: u64,
        address: &Address,
        size: usize,
    ) -> Result<Value> {
        self.memory.check_region(address)?;

        let result = self
            .check_access(address, size)
            .and_then(|_| self.memory.read(address, size));

        Ok(result.unwrap_or_else(|err| {
            Value::symbol(
                format!(
                    "{name}[{offset}] (value not retrieved: {err})",
                    name = self.name(),
                    offset = address.offset()
                ),
                Width::from_bytes(size).unwrap_or(Width::W32),
            )
        }))
    }

    fn set(
        &mut self,
        _log: &mut DiagnosticLog,
        _iaddr: u64,
        address: &Address,
        value: &Value,
    ) -> Result<String> {
        self.memory.check_region(address)?;
        self.check_access(address, value.num_bytes().unwrap_or_default())?;
        self.memory.write(address, value)?;
        Ok(describe_store(address, value))
    }
}

/// Read from the text of a constant string. The string is followed by a NUL terminator and
/// zeros beyond.
pub fn read_constant(
    text: &str,
    address: &Address,
    size: usize,
    endianness: Endianness,
) -> Result<Value> {
    let bytes = text.as_bytes();
    let memory_order = span(address, size)
        .map(|offset| {
            let byte = usize::try_from(offset)
                .ok()
                .and_then(|index| bytes.get(index))
                .copied()
                .unwrap_or(0);
            MemoryByte::Concrete(byte)
        })
        .collect();

    Ok(bytes_to_value(memory_order, endianness, address))
}
