//! Line oriented dictionary file loader.
//!
//! ```text
//! ATTRIBUTE    <name> <type> <data-type> [flags]
//! VALUE        <attr-name> <value-name> <int|hex>
//! VENDOR       <vendor-id> <vendor-name> [format=<typeSize>,<lengthSize>]
//! VENDORATTR   <vendor-id> <name> <type> <data-type> [flags]
//! BEGIN-VENDOR <vendor-name>
//! END-VENDOR   <vendor-name>
//! $INCLUDE     <relative-path>
//! ```
//!
//! `#` starts a comment. `flags` is a comma separated list drawn from
//! `has_tag` and `encrypt=1|2|3`. Integer fields accept decimal or
//! `0x` hex. `$INCLUDE` resolves relative to the including file; a
//! missing include is a warning, not an error.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    Error,
    attribute::{
        VENDOR_NONE,
        cipher::Cipher,
        value::{DataType, parse_u32},
    },
    dict::{AttributeTemplate, Dictionary, Vendor},
};

impl Dictionary {
    /// Load a dictionary file, following `$INCLUDE` lines. Include
    /// cycles are broken by tracking normalized paths.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let mut seen = HashSet::new();
        self.load_recursive(path.as_ref(), &mut seen, true)
    }

    /// Parse dictionary text with no backing file. `$INCLUDE` lines
    /// cannot be resolved and are skipped with a warning.
    pub fn parse_str(&mut self, text: &str) -> Result<(), Error> {
        self.parse_lines(text, None, &mut HashSet::new())
    }

    fn load_recursive(
        &mut self,
        path: &Path,
        seen: &mut HashSet<PathBuf>,
        required: bool,
    ) -> Result<(), Error> {
        let normalized = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !seen.insert(normalized) {
            log::warn!("dictionary include cycle: path={:?}", path);
            return Ok(());
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if !required => {
                log::warn!("dictionary include missing: path={:?}, error={:?}", path, e);
                return Ok(());
            }
            Err(e) => {
                return Err(Error::Dictionary {
                    line: 0,
                    reason: format!("{}: {}", path.display(), e),
                });
            }
        };

        self.parse_lines(&text, path.parent(), seen)
    }

    fn parse_lines(
        &mut self,
        text: &str,
        base: Option<&Path>,
        seen: &mut HashSet<PathBuf>,
    ) -> Result<(), Error> {
        let mut vendor_stack: Vec<u32> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let tokens: Vec<&str> = content.split_whitespace().collect();
            match tokens[0] {
                "ATTRIBUTE" => {
                    let [name, kind, data_type, rest @ ..] = &tokens[1..] else {
                        return Err(err(line, "ATTRIBUTE takes a name, a type and a data type"));
                    };

                    let vendor_id = vendor_stack.last().map(|id| *id as i32).unwrap_or(VENDOR_NONE);
                    self.parse_attribute(line, vendor_id, name, kind, data_type, rest)?;
                }
                "VENDORATTR" => {
                    let [vendor, name, kind, data_type, rest @ ..] = &tokens[1..] else {
                        return Err(err(line, "VENDORATTR takes a vendor id, a name, a type and a data type"));
                    };

                    let vendor_id = number(line, vendor)? as i32;
                    self.parse_attribute(line, vendor_id, name, kind, data_type, rest)?;
                }
                "VALUE" => {
                    let [attribute, name, value] = &tokens[1..] else {
                        return Err(err(line, "VALUE takes an attribute, a name and a number"));
                    };

                    self.insert_value(attribute, name, number(line, value)?)
                        .map_err(|e| err(line, e.to_string()))?;
                }
                "VENDOR" => {
                    let (id, name, format) = match &tokens[1..] {
                        [id, name] => (id, name, None),
                        [id, name, format] => (id, name, Some(*format)),
                        _ => return Err(err(line, "VENDOR takes an id and a name")),
                    };

                    let id = number(line, id)?;
                    let vendor = match format.and_then(|f| f.strip_prefix("format=")) {
                        None => Vendor::new(id, *name),
                        Some(sizes) => {
                            let (type_size, length_size) = sizes
                                .split_once(',')
                                .ok_or_else(|| err(line, "vendor format is <typeSize>,<lengthSize>"))?;

                            Vendor::with_format(
                                id,
                                *name,
                                number(line, type_size)? as usize,
                                number(line, length_size)? as usize,
                            )
                            .map_err(|e| err(line, e.to_string()))?
                        }
                    };

                    self.insert_vendor(vendor).map_err(|e| err(line, e.to_string()))?;
                }
                "BEGIN-VENDOR" => {
                    let [name] = &tokens[1..] else {
                        return Err(err(line, "BEGIN-VENDOR takes a vendor name"));
                    };

                    let vendor = self
                        .vendor_by_name(name)
                        .ok_or_else(|| err(line, format!("unknown vendor {:?}", name)))?;
                    vendor_stack.push(vendor.id);
                }
                "END-VENDOR" => {
                    let [name] = &tokens[1..] else {
                        return Err(err(line, "END-VENDOR takes a vendor name"));
                    };

                    let expected = vendor_stack.pop().and_then(|id| self.vendor(id));
                    if expected.map(|vendor| vendor.name.as_str()) != Some(*name) {
                        return Err(err(line, format!("unbalanced END-VENDOR {:?}", name)));
                    }
                }
                "$INCLUDE" => {
                    let [target] = &tokens[1..] else {
                        return Err(err(line, "$INCLUDE takes a path"));
                    };

                    match base {
                        Some(base) => self.load_recursive(&base.join(target), seen, false)?,
                        None => {
                            log::warn!("dictionary $INCLUDE without a base path: target={:?}", target)
                        }
                    }
                }
                keyword => return Err(err(line, format!("unknown keyword {:?}", keyword))),
            }
        }

        Ok(())
    }

    fn parse_attribute(
        &mut self,
        line: usize,
        vendor_id: i32,
        name: &str,
        kind: &str,
        data_type: &str,
        flags: &[&str],
    ) -> Result<(), Error> {
        let mut template = AttributeTemplate::new(
            vendor_id,
            number(line, kind)?,
            name,
            DataType::from_name(data_type),
        );

        for flag in flags.iter().flat_map(|f| f.split(',')) {
            match flag {
                "" => {}
                "has_tag" => template = template.with_tag(),
                _ => match flag.strip_prefix("encrypt=") {
                    Some(scheme) => {
                        let cipher = Cipher::from_flag(number(line, scheme)? as u8)
                            .ok_or_else(|| err(line, format!("unknown encrypt flag {:?}", scheme)))?;
                        template = template.with_cipher(cipher);
                    }
                    None => return Err(err(line, format!("unknown flag {:?}", flag))),
                },
            }
        }

        self.insert_template(template).map_err(|e| err(line, e.to_string()))
    }
}

fn err(line: usize, reason: impl Into<String>) -> Error {
    Error::Dictionary {
        line,
        reason: reason.into(),
    }
}

fn number(line: usize, token: &str) -> Result<u32, Error> {
    parse_u32(token).map_err(|e| err(line, e.to_string()))
}
