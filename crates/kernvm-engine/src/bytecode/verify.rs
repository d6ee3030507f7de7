//! Executable verification
//!
//! Checks run once at load time so the execution loop can index register
//! files and the kernel table without bounds handling.

use super::function::{Executable, Function, RegIndex};
use crate::vm::{VmError, VmResult};

/// Verify every function in an executable
pub fn verify_executable(executable: &Executable) -> VmResult<()> {
    let kernel_count = executable.kernel_names.len();
    for function in &executable.functions {
        verify_function(function, kernel_count)?;
    }
    Ok(())
}

fn verify_function(function: &Function, kernel_count: usize) -> VmResult<()> {
    if function.kernels.is_empty() {
        return Err(VmError::EmptyFunction(function.name.clone()));
    }

    check_registers(function, &function.input_regs)?;

    for (pc, kernel) in function.kernels.iter().enumerate() {
        if kernel.code as usize >= kernel_count {
            return Err(VmError::InvalidOpcode {
                function: function.name.clone(),
                pc,
                code: kernel.code,
            });
        }
        check_registers(function, &kernel.arguments)?;
        check_registers(function, &kernel.results)?;
    }
    Ok(())
}

fn check_registers(function: &Function, regs: &[RegIndex]) -> VmResult<()> {
    match regs.iter().find(|&&reg| reg >= function.num_regs) {
        Some(&index) => Err(VmError::InvalidRegister {
            function: function.name.clone(),
            index,
            num_regs: function.num_regs,
        }),
        None => Ok(()),
    }
}
