use crate::proof::ir::Program;
use crate::proof::op::Instruction;
use std::fmt::Write;

/// Renders a numbered listing of a program, with function bodies indented
/// under their `op_func` line.
pub fn format_program(program: &Program) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "════════════════════════════════════════");
    let _ = writeln!(out, " main");
    let _ = writeln!(
        out,
        " {} instructions, {} functions",
        program.len(),
        program.functions().len()
    );
    let _ = writeln!(out, "════════════════════════════════════════");

    format_block(&mut out, program.instructions(), 0);
    out
}

/// Print disassembly of a program to stdout
pub fn print_program(program: &Program) {
    print!("{}", format_program(program));
}

fn format_block(out: &mut String, instructions: &[Instruction], indent: usize) {
    let prefix = "  ".repeat(indent);

    for (ip, inst) in instructions.iter().enumerate() {
        let _ = write!(out, "{}{:04}  {}", prefix, ip, inst.opcode());

        match inst {
            Instruction::Store(slot) | Instruction::Load(slot) | Instruction::Swap(slot) => {
                let _ = write!(out, " {}", slot);
            }
            Instruction::DefineFunction { name, body } => {
                let _ = writeln!(out, " {} ({} instructions)", name, body.len());
                format_block(out, body, indent + 1);
                continue;
            }
            _ => {
                for operand in inst.operands() {
                    let _ = write!(out, " {}", operand);
                }
            }
        }

        let _ = writeln!(out);
    }
}
