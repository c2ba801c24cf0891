use crate::disasm::Listing;
use crate::instr::Instruction;
use crate::memory::Address;
use crate::registers::RegisterFile;
use crate::symbol::{Flag, Register};

/// Width of the byte column in listings; fits the longest instruction.
const BYTES_COLUMN: usize = 12;
/// Width of the instruction text in trace lines.
const TEXT_COLUMN: usize = 24;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02X}", byte)).collect()
}

/// `PPPP:OOOO  B8000500    mov ax, 0x0005`
pub fn listing_line(page: u16, listing: &Listing, bytes: &[u8]) -> String {
    format!(
        "{}  {:<width$}{}",
        Address::new(page, listing.offset()),
        hex(bytes),
        listing.text(),
        width = BYTES_COLUMN
    )
}

/// `PPPP:OOOO  41000100    inc ax                  AX=0002`
pub fn trace_line(
    address: Address,
    instruction: &Instruction,
    before: &RegisterFile,
    after: &RegisterFile,
) -> String {
    let line = format!(
        "{}  {:<bytes$}{:<text$}{}",
        address,
        hex(&instruction.encode()),
        instruction.to_string(),
        changes(before, after),
        bytes = BYTES_COLUMN,
        text = TEXT_COLUMN
    );
    line.trim_end().to_string()
}

/// Registers and flags which differ between two states. IP is left out.
pub fn changes(before: &RegisterFile, after: &RegisterFile) -> String {
    let mut parts = Vec::new();
    for register in Register::ALL {
        if register == Register::Ip || before.get(register) == after.get(register) {
            continue;
        }
        parts.push(format!(
            "{}={:04X}",
            register.name().to_ascii_uppercase(),
            after.get(register)
        ));
    }
    for flag in Flag::ALL {
        if before.get_flag(flag) != after.get_flag(flag) {
            let (clear, set) = flag.states();
            parts.push(if after.get_flag(flag) { set } else { clear }.to_string());
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disasm::disassemble;

    #[test]
    fn listing_columns() {
        let bytes = [0xB8, 0x05, 0x00, 0x00, 0xFF];
        let listing: Vec<Listing> = disassemble(&bytes, 0x100).collect();
        assert_eq!(
            listing_line(0, &listing[0], &bytes[..4]),
            "0000:0100  B8000500    mov ax, 0x0005"
        );
        assert_eq!(
            listing_line(0, &listing[1], &bytes[4..]),
            "0000:0104  FF          ??? ; Unknown opcode FF at 0104."
        );
    }

    #[test]
    fn trace_columns() {
        let bytes = [0xB8, 0x00, 0x05, 0x00];
        let instruction = Instruction::decode(&bytes, 0x100).unwrap();
        let before = RegisterFile::new();
        let mut after = before.clone();
        after.set(Register::Ax, 5);
        assert_eq!(
            trace_line(Address::new(0, 0x100), &instruction, &before, &after),
            format!("0000:0100  B8000500    mov ax, 0x0005{}AX=0005", " ".repeat(10))
        );
        assert_eq!(
            trace_line(Address::new(0, 0x100), &instruction, &before, &before),
            "0000:0100  B8000500    mov ax, 0x0005"
        );
    }

    #[test]
    fn changed_state() {
        let before = RegisterFile::new();
        let mut after = before.clone();
        assert_eq!(changes(&before, &after), "");
        after.set(Register::Cx, 0x0010);
        after.set_ip(0x0200);
        after.set_flag(Flag::Zero, true);
        after.set_flag(Flag::Carry, true);
        assert_eq!(changes(&before, &after), "CX=0010 ZR CY");
    }
}
