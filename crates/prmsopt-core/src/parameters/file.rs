/// PRMS text parameter file codec.
///
/// Layout: free-form header lines, `** Dimensions **`, one `####` block per
/// dimension (name, size), `** Parameters **`, then one `####` block per
/// parameter (name, ndims, dimension names, length, type code, values).
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use smallvec::SmallVec;

use super::set::{Parameter, ParameterOverlay, ParameterSet, ValueType};
use crate::error::{Error, Result};

const DIMENSIONS_MARKER: &str = "** Dimensions **";
const PARAMETERS_MARKER: &str = "** Parameters **";
const BLOCK_MARKER: &str = "####";

/// Non-blank lines with their 1-based line numbers.
struct Lines<'a> {
    path: &'a Path,
    inner: std::iter::Peekable<Box<dyn Iterator<Item = (usize, &'a str)> + 'a>>,
    last_line: usize,
}

impl<'a> Lines<'a> {
    fn new(path: &'a Path, text: &'a str) -> Self {
        let iter: Box<dyn Iterator<Item = (usize, &'a str)> + 'a> = Box::new(
            text.lines()
                .enumerate()
                .map(|(i, l)| (i + 1, l.trim()))
                .filter(|(_, l)| !l.is_empty()),
        );
        Self {
            path,
            inner: iter.peekable(),
            last_line: 0,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> Error {
        Error::ParameterFile {
            path: self.path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    fn next(&mut self, what: &str) -> Result<(usize, &'a str)> {
        match self.inner.next() {
            Some((n, l)) => {
                self.last_line = n;
                Ok((n, l))
            }
            None => Err(self.error(
                self.last_line,
                format!("unexpected end of file, expected {}", what),
            )),
        }
    }

    fn peek(&mut self) -> Option<&'a str> {
        self.inner.peek().map(|(_, l)| *l)
    }

    fn next_usize(&mut self, what: &str) -> Result<usize> {
        let (n, l) = self.next(what)?;
        let token = l.split_whitespace().next().unwrap_or(l);
        token
            .parse()
            .map_err(|_| self.error(n, format!("expected {}, found {:?}", what, l)))
    }

    fn next_name(&mut self, what: &str) -> Result<String> {
        let (_, l) = self.next(what)?;
        // Older files append a field width after the name.
        Ok(l.split_whitespace().next().unwrap_or(l).to_string())
    }
}

/// Read a PRMS parameter file into a base `ParameterSet`.
pub fn read_parameter_file(path: &Path) -> Result<ParameterSet> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let set = parse_parameters(path, &text)?;
    Ok(set.with_base_file(path))
}

fn parse_parameters(path: &Path, text: &str) -> Result<ParameterSet> {
    let mut lines = Lines::new(path, text);

    let mut header = Vec::new();
    loop {
        let (_, l) = lines.next(DIMENSIONS_MARKER)?;
        if l == DIMENSIONS_MARKER {
            break;
        }
        header.push(l.to_string());
    }

    let mut dimensions = Vec::new();
    loop {
        let (n, l) = lines.next(PARAMETERS_MARKER)?;
        if l == PARAMETERS_MARKER {
            break;
        }
        if l != BLOCK_MARKER {
            return Err(lines.error(n, format!("expected {}, found {:?}", BLOCK_MARKER, l)));
        }
        let name = lines.next_name("dimension name")?;
        let size = lines.next_usize("dimension size")?;
        dimensions.push((name, size));
    }

    let mut parameters = Vec::new();
    while lines.peek().is_some() {
        let (n, l) = lines.next(BLOCK_MARKER)?;
        if l != BLOCK_MARKER {
            return Err(lines.error(n, format!("expected {}, found {:?}", BLOCK_MARKER, l)));
        }
        parameters.push(parse_parameter_block(&mut lines)?);
    }

    ParameterSet::new(header, dimensions, parameters).map_err(|e| Error::ParameterFile {
        path: path.to_path_buf(),
        line: 0,
        message: e.to_string(),
    })
}

fn parse_parameter_block(lines: &mut Lines<'_>) -> Result<Parameter> {
    let name = lines.next_name("parameter name")?;
    let ndims = lines.next_usize("number of dimensions")?;
    let mut dimnames: SmallVec<[String; 2]> = SmallVec::new();
    for _ in 0..ndims {
        dimnames.push(lines.next_name("dimension name")?);
    }
    let length = lines.next_usize("parameter length")?;
    let (type_line, code) = lines.next("type code")?;
    let value_type = code
        .parse::<u8>()
        .ok()
        .and_then(ValueType::from_code)
        .ok_or_else(|| {
            lines.error(
                type_line,
                format!(
                    "{}: unsupported type code {} (string parameters are not supported)",
                    name, code
                ),
            )
        })?;

    let mut values = Vec::with_capacity(length);
    while values.len() < length {
        let (n, l) = lines.next("parameter value")?;
        for token in l.split_whitespace() {
            let v: f64 = token
                .parse()
                .map_err(|_| lines.error(n, format!("{}: invalid value {:?}", name, token)))?;
            values.push(v);
        }
    }
    if values.len() != length {
        return Err(lines.error(
            lines.last_line,
            format!("{}: expected {} values, found {}", name, length, values.len()),
        ));
    }

    Ok(Parameter {
        name,
        dimnames,
        value_type,
        values,
    })
}

/// Write an overlaid parameter set in PRMS format.
pub fn write_parameter_file(params: &ParameterOverlay, path: &Path) -> Result<()> {
    let file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    let mut w = BufWriter::new(file);
    write_parameters(&mut w, params).map_err(|e| Error::io(PathBuf::from(path), e))?;
    w.flush().map_err(|e| Error::io(path, e))
}

fn write_parameters<W: Write>(w: &mut W, params: &ParameterOverlay) -> std::io::Result<()> {
    let base = params.base();
    for line in base.header() {
        writeln!(w, "{}", line)?;
    }
    writeln!(w, "{}", DIMENSIONS_MARKER)?;
    for (name, size) in base.dimensions() {
        writeln!(w, "{}", BLOCK_MARKER)?;
        writeln!(w, "{}", name)?;
        writeln!(w, "{}", size)?;
    }
    writeln!(w, "{}", PARAMETERS_MARKER)?;
    for p in params.iter() {
        writeln!(w, "{}", BLOCK_MARKER)?;
        writeln!(w, "{}", p.name)?;
        writeln!(w, "{}", p.ndims())?;
        for d in &p.dimnames {
            writeln!(w, "{}", d)?;
        }
        writeln!(w, "{}", p.length())?;
        writeln!(w, "{}", p.value_type.code())?;
        for v in &p.values {
            match p.value_type {
                ValueType::Integer => writeln!(w, "{}", v.round() as i64)?,
                ValueType::Float | ValueType::Double => writeln!(w, "{}", v)?,
            }
        }
    }
    Ok(())
}
