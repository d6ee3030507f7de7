//! Kernel, function, and executable definitions

/// Index of a register within a function's register file
pub type RegIndex = u32;

/// Identifier of a function within an [`Executable`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u32);

impl FunctionId {
    /// Create a FunctionId from a raw function index
    pub fn new(index: u32) -> Self {
        FunctionId(index)
    }

    /// Get the raw function index
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Get the function index as a `usize`
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single bytecode operation
///
/// `code` selects the kernel body from the executable's kernel-name table.
/// `arguments` and `results` are register indices into the owning
/// function's register file. `attributes` carry immediate operands such as
/// the index of a callee function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Kernel {
    /// Opcode (index into `Executable::kernel_names`)
    pub code: u32,
    /// Registers read by the kernel
    pub arguments: Vec<RegIndex>,
    /// Registers written by the kernel
    pub results: Vec<RegIndex>,
    /// Immediate operands
    pub attributes: Vec<u32>,
}

impl Kernel {
    /// Create a kernel with no operands
    pub fn new(code: u32) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    /// Set the argument registers
    pub fn with_arguments(mut self, arguments: impl Into<Vec<RegIndex>>) -> Self {
        self.arguments = arguments.into();
        self
    }

    /// Set the result registers
    pub fn with_results(mut self, results: impl Into<Vec<RegIndex>>) -> Self {
        self.results = results.into();
        self
    }

    /// Set the immediate operands
    pub fn with_attributes(mut self, attributes: impl Into<Vec<u32>>) -> Self {
        self.attributes = attributes.into();
        self
    }

    /// Get an immediate operand
    #[inline]
    pub fn attribute(&self, index: usize) -> Option<u32> {
        self.attributes.get(index).copied()
    }
}

/// Function definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Number of registers in each activation's register file
    pub num_regs: u32,
    /// Registers that receive call arguments, in argument order
    pub input_regs: Vec<RegIndex>,
    /// Kernels in program order
    pub kernels: Vec<Kernel>,
}

impl Function {
    /// Create an empty function with `num_regs` registers
    pub fn new(name: impl Into<String>, num_regs: u32) -> Self {
        Self {
            name: name.into(),
            num_regs,
            input_regs: Vec::new(),
            kernels: Vec::new(),
        }
    }

    /// Set the input registers
    pub fn with_inputs(mut self, input_regs: impl Into<Vec<RegIndex>>) -> Self {
        self.input_regs = input_regs.into();
        self
    }

    /// Append a kernel
    pub fn kernel(mut self, kernel: Kernel) -> Self {
        self.kernels.push(kernel);
        self
    }

    /// Number of kernels
    #[inline]
    pub fn kernel_count(&self) -> usize {
        self.kernels.len()
    }
}

/// A complete program: kernel-name table plus functions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Executable {
    /// Kernel names, indexed by opcode
    pub kernel_names: Vec<String>,
    /// Functions, indexed by [`FunctionId`]
    pub functions: Vec<Function>,
}

impl Executable {
    /// Create an empty executable
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the opcode for a kernel name, adding it to the table if needed
    pub fn kernel_code(&mut self, name: &str) -> u32 {
        if let Some(pos) = self.kernel_names.iter().position(|n| n == name) {
            return pos as u32;
        }
        self.kernel_names.push(name.to_string());
        (self.kernel_names.len() - 1) as u32
    }

    /// Add a function and return its id
    pub fn add_function(&mut self, function: Function) -> FunctionId {
        self.functions.push(function);
        FunctionId::new((self.functions.len() - 1) as u32)
    }

    /// Look up a function by id
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// Look up a function id by name
    pub fn function_id(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|pos| FunctionId::new(pos as u32))
    }
}
