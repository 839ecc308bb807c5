//! Built-in function implementations
//!
//! This module provides the C library functions that are handled by the
//! interpreter rather than being defined in user code. They are bound in the
//! root frame, so a program may shadow them.
//!
//! # Supported Built-ins
//!
//! - `malloc(size)`, `calloc(count, size)`, `free(ptr)`: heap allocation
//! - `strcpy(dst, src)`, `strlen(s)`, `strcmp(a, b)`: string handling
//! - `printf(format, ...)`, `puts(s)`, `putchar(c)`: output to the context
//! - `scanf(format, ...)`: whitespace separated input from the context
//! - `exit(status)`: terminate the program
//!
//! # Implementation Notes
//!
//! - `printf` supports `%d`, `%i`, `%u`, `%x`, `%c`, `%s`, `%f` (with an optional
//!   `.N` precision), `%p` and `%%`
//! - `scanf` supports `%d`, `%f`, `%c`, `%s` and returns the number of items stored
//! - `free(NULL)` does nothing
//! - Arguments are converted to the parameter types with the implicit cast rules

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{RuntimeError, TypeError};
use crate::memory::encode_char;
use crate::memory::frame::Frame;
use crate::memory::value::TypedValue;
use crate::types::DataType;
use std::fmt;
use tracing::debug;

/// A function provided by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Malloc,
    Calloc,
    Free,
    Strcpy,
    Strlen,
    Strcmp,
    Printf,
    Puts,
    Putchar,
    Scanf,
    Exit,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Malloc,
        Builtin::Calloc,
        Builtin::Free,
        Builtin::Strcpy,
        Builtin::Strlen,
        Builtin::Strcmp,
        Builtin::Printf,
        Builtin::Puts,
        Builtin::Putchar,
        Builtin::Scanf,
        Builtin::Exit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Malloc => "malloc",
            Builtin::Calloc => "calloc",
            Builtin::Free => "free",
            Builtin::Strcpy => "strcpy",
            Builtin::Strlen => "strlen",
            Builtin::Strcmp => "strcmp",
            Builtin::Printf => "printf",
            Builtin::Puts => "puts",
            Builtin::Putchar => "putchar",
            Builtin::Scanf => "scanf",
            Builtin::Exit => "exit",
        }
    }

    pub fn return_type(&self) -> DataType {
        match self {
            Builtin::Malloc | Builtin::Calloc => DataType::void_pointer(),
            Builtin::Strcpy => DataType::Char.pointer_to(),
            Builtin::Free | Builtin::Exit => DataType::Void,
            _ => DataType::Int,
        }
    }

    /// Fixed parameter types. Variadic builtins list only the leading ones.
    pub fn params(&self) -> Vec<DataType> {
        let char_ptr = || DataType::Char.pointer_to();
        match self {
            Builtin::Malloc | Builtin::Putchar | Builtin::Exit => vec![DataType::Int],
            Builtin::Calloc => vec![DataType::Int, DataType::Int],
            Builtin::Free => vec![DataType::void_pointer()],
            Builtin::Strcpy | Builtin::Strcmp => vec![char_ptr(), char_ptr()],
            Builtin::Strlen | Builtin::Puts | Builtin::Printf | Builtin::Scanf => {
                vec![char_ptr()]
            }
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, Builtin::Printf | Builtin::Scanf)
    }

    pub fn signature(&self) -> String {
        let mut params: Vec<String> = self.params().iter().map(|p| p.to_string()).collect();
        if self.is_variadic() {
            params.push("...".to_string());
        }
        format!("{}({})", self.return_type(), params.join(","))
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn format_error(builtin: Builtin, message: impl Into<String>) -> RuntimeError {
    TypeError::InvalidFormat {
        function: builtin.name().to_string(),
        message: message.into(),
    }
    .into()
}

fn int(value: i64) -> TypedValue {
    TypedValue::new(value as f64, DataType::Int)
}

impl Interpreter {
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<TypedValue>,
        frame: &mut Frame<'_>,
    ) -> Result<TypedValue, RuntimeError> {
        let args = check_arguments(builtin, args)?;
        debug!("builtin {}({} args)", builtin, args.len());

        match builtin {
            Builtin::Malloc => frame.allocate_on_heap(args[0].to_int() as i64),

            Builtin::Calloc => {
                let total = args[0].to_int() as i64 * args[1].to_int() as i64;
                let pointer = frame.allocate_on_heap(total)?;
                frame
                    .memory_mut()
                    .fill(pointer.to_address(), total as u32, 0)?;
                Ok(pointer)
            }

            Builtin::Free => {
                if args[0].to_address() != 0 {
                    frame.free(&args[0])?;
                }
                Ok(TypedValue::void())
            }

            Builtin::Strcpy => {
                let text = frame.dereference_as_string(&args[1])?;
                frame
                    .memory_mut()
                    .write_string(args[0].to_address(), &text)?;
                Ok(args[0].clone())
            }

            Builtin::Strlen => {
                let text = frame.dereference_as_string(&args[0])?;
                Ok(int(text.chars().count() as i64))
            }

            Builtin::Strcmp => {
                let a = frame.dereference_as_string(&args[0])?;
                let b = frame.dereference_as_string(&args[1])?;
                Ok(int(a.cmp(&b) as i64))
            }

            Builtin::Printf => {
                let format = frame.dereference_as_string(&args[0])?;
                let text = format_printf(&format, &args[1..], frame)?;
                self.context.print(&text);
                Ok(int(text.chars().count() as i64))
            }

            Builtin::Puts => {
                let text = frame.dereference_as_string(&args[0])?;
                self.context.print(&text);
                self.context.print("\n");
                Ok(int(text.chars().count() as i64 + 1))
            }

            Builtin::Putchar => {
                let c = args[0].to_int() as u8 as char;
                self.context.print(&c.to_string());
                Ok(int(c as i64))
            }

            Builtin::Scanf => {
                let format = frame.dereference_as_string(&args[0])?;
                self.builtin_scanf(&format, &args[1..], frame)
            }

            Builtin::Exit => {
                let status = args[0].to_int();
                debug!("exit({})", status);
                Err(RuntimeError::Exit { status })
            }
        }
    }

    fn builtin_scanf(
        &mut self,
        format: &str,
        targets: &[TypedValue],
        frame: &Frame<'_>,
    ) -> Result<TypedValue, RuntimeError> {
        let mut stored = 0;
        let mut targets = targets.iter();
        let mut chars = format.chars();

        while let Some(ch) = chars.next() {
            if ch != '%' {
                continue;
            }
            let spec = chars
                .next()
                .ok_or_else(|| format_error(Builtin::Scanf, "format ends after '%'"))?;
            if spec == '%' {
                continue;
            }

            let target = targets
                .next()
                .ok_or_else(|| format_error(Builtin::Scanf, "not enough arguments for format string"))?;
            if !target.data_type().is_pointer_like() {
                return Err(format_error(
                    Builtin::Scanf,
                    format!("%{} expects a pointer, got '{}'", spec, target.data_type()),
                ));
            }
            let pointee = target.data_type().dereference()?;
            let address = target.to_address();

            match spec {
                'd' | 'i' => {
                    let Some(n) = self.context.next_token().and_then(|t| t.parse::<i64>().ok())
                    else {
                        break;
                    };
                    frame.assign_value_by_address(address, &pointee, &int(n))?;
                }
                'f' => {
                    let Some(x) = self.context.next_token().and_then(|t| t.parse::<f64>().ok())
                    else {
                        break;
                    };
                    let value = TypedValue::new(x, DataType::Float);
                    frame.assign_value_by_address(address, &pointee, &value)?;
                }
                'c' => {
                    let Some(c) = self.context.next_char() else {
                        break;
                    };
                    let value = TypedValue::new(encode_char(c) as f64, DataType::Char);
                    frame.assign_value_by_address(address, &pointee, &value)?;
                }
                's' => {
                    let Some(word) = self.context.next_token() else {
                        break;
                    };
                    frame.memory_mut().write_string(address, &word)?;
                }
                other => {
                    return Err(format_error(
                        Builtin::Scanf,
                        format!("unsupported format specifier: %{}", other),
                    ))
                }
            }
            stored += 1;
        }

        Ok(int(stored))
    }
}

/// Check the argument count and convert the fixed arguments to their parameter types
fn check_arguments(
    builtin: Builtin,
    mut args: Vec<TypedValue>,
) -> Result<Vec<TypedValue>, RuntimeError> {
    let params = builtin.params();
    let count_ok = if builtin.is_variadic() {
        args.len() >= params.len()
    } else {
        args.len() == params.len()
    };
    if !count_ok {
        return Err(TypeError::ArgumentCount {
            function: builtin.name().to_string(),
            expected: params.len(),
            got: args.len(),
        }
        .into());
    }

    for (index, param) in params.iter().enumerate() {
        let arg = &args[index];
        let converted = arg.implicit_cast(param).map_err(|_| TypeError::ArgumentType {
            function: builtin.name().to_string(),
            index,
            expected: param.to_string(),
            got: arg.data_type().to_string(),
        })?;
        args[index] = converted;
    }
    Ok(args)
}

fn format_printf(
    format: &str,
    args: &[TypedValue],
    frame: &Frame<'_>,
) -> Result<String, RuntimeError> {
    let mut output = String::new();
    let mut chars = format.chars().peekable();
    let mut args = args.iter();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            output.push(ch);
            continue;
        }

        // Optional precision, only meaningful for %f
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(|c| c.is_ascii_digit()) {
                digits.push(d);
                chars.next();
            }
            precision = Some(digits.parse::<usize>().unwrap_or(0));
        }

        let Some(spec) = chars.next() else {
            output.push('%');
            break;
        };
        if spec == '%' {
            output.push('%');
            continue;
        }

        let arg = args.next().ok_or_else(|| {
            format_error(Builtin::Printf, "not enough arguments for format string")
        })?;
        let ty = arg.data_type();

        match spec {
            'd' | 'i' | 'u' | 'x' | 'c' => {
                if !ty.is_whole_number() {
                    return Err(format_error(
                        Builtin::Printf,
                        format!("%{} expects int or char, got '{}'", spec, ty),
                    ));
                }
                let n = arg.to_int();
                match spec {
                    'u' => output.push_str(&(n as u32).to_string()),
                    'x' => output.push_str(&format!("{:x}", n as u32)),
                    'c' => output.push(n as u8 as char),
                    _ => output.push_str(&n.to_string()),
                }
            }
            'f' => {
                if !ty.is_arithmetic() {
                    return Err(format_error(
                        Builtin::Printf,
                        format!("%f expects float, got '{}'", ty),
                    ));
                }
                output.push_str(&format!("{:.*}", precision.unwrap_or(6), arg.value()));
            }
            's' => {
                if !ty.is_pointer_like() {
                    return Err(format_error(
                        Builtin::Printf,
                        format!("%s expects char*, got '{}'", ty),
                    ));
                }
                output.push_str(&frame.dereference_as_string(arg)?);
            }
            'p' => {
                if !ty.is_pointer_like() {
                    return Err(format_error(
                        Builtin::Printf,
                        format!("%p expects a pointer, got '{}'", ty),
                    ));
                }
                output.push_str(&format!("0x{:x}", arg.to_address()));
            }
            other => {
                return Err(format_error(
                    Builtin::Printf,
                    format!("unsupported format specifier: %{}", other),
                ));
            }
        }
    }

    Ok(output)
}
