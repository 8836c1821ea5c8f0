mod instruction;
mod mips;
