//! Netlist interpreter: builds a connected circuit, probe list and switch
//! schedule from tokenized statements.

use simlogue_core::{units, Circuit, Element, PinRef, Quantity, Scope};
use simlogue_devices::{
    AcVoltageSource, AcVoltageSource2, Capacitor, CurrentSource, Device, Ground, Inductor, OpAmp,
    Resistor, Switch, VoltageSource, VoltageSource2,
};

use crate::error::{Error, Result};
use crate::lexer::{Lexer, Line, Token};

/// A fully interpreted netlist, ready to hand to the simulator.
#[derive(Debug)]
pub struct Netlist {
    pub circuit: Circuit<Device>,
    pub scopes: Vec<Scope>,
}

/// Parse a netlist source text.
pub fn parse(input: &str) -> Result<Netlist> {
    let mut parser = Parser::new();
    for line in Lexer::tokenize(input) {
        parser.statement(&line)?;
    }
    Ok(Netlist {
        circuit: parser.circuit,
        scopes: parser.scopes,
    })
}

const DEVICE_KINDS: &[&str] = &[
    "resistor",
    "capacitor",
    "inductor",
    "current_source",
    "voltage_source",
    "voltage_source_2P",
    "ac_voltage_source",
    "ac_voltage_source_2P",
    "switch",
    "op_amp",
];

/// A declared parameter: expected quantity, optional default.
struct Param(Quantity, Option<f64>);

fn check_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Parser {
    circuit: Circuit<Device>,
    scopes: Vec<Scope>,
}

impl Parser {
    fn new() -> Self {
        let mut circuit = Circuit::new();
        let gnd = circuit
            .add_device(Ground::new("GND").into())
            .expect("fresh circuit");
        circuit.attach(PinRef::new(gnd, 0), circuit.ground());
        Self {
            circuit,
            scopes: Vec::new(),
        }
    }

    fn statement(&mut self, line: &Line) -> Result<()> {
        let head = line.tokens[0].word().unwrap_or_default();
        if DEVICE_KINDS.contains(&head) {
            self.device_decl(line, head)
        } else if head == "scope" {
            self.scope_decl(line)
        } else if head == "turn" {
            self.turn_decl(line)
        } else {
            self.connections(line)
        }
    }

    // --- shared token helpers ---

    fn word<'a>(&self, line: &'a Line, idx: usize, what: &str) -> Result<&'a str> {
        line.tokens
            .get(idx)
            .and_then(Token::word)
            .ok_or_else(|| {
                let got = line
                    .tokens
                    .get(idx)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                Error::syntax(line.number, format!("expected {what}, got '{got}'"))
            })
    }

    fn keyword(&self, line: &Line, idx: usize, expected: &Token) -> Result<()> {
        match line.tokens.get(idx) {
            Some(token) if token == expected => Ok(()),
            other => {
                let got = other.map(ToString::to_string).unwrap_or_default();
                Err(Error::syntax(
                    line.number,
                    format!("expected '{expected}', got '{got}'"),
                ))
            }
        }
    }

    fn end(&self, line: &Line, idx: usize) -> Result<()> {
        match line.tokens.get(idx) {
            None => Ok(()),
            Some(token) => Err(Error::syntax(
                line.number,
                format!("unexpected token '{token}'"),
            )),
        }
    }

    fn lookup(&self, name: &str, line: usize) -> Result<usize> {
        if !check_name(name) {
            return Err(Error::name(line, format!("invalid part name '{name}'")));
        }
        self.circuit
            .device_index(name)
            .ok_or_else(|| Error::name(line, format!("unknown part name '{name}'")))
    }

    // --- device declarations ---

    fn device_decl(&mut self, line: &Line, kind: &str) -> Result<()> {
        let name = self
            .word(line, 1, &format!("a part name after '{kind}'"))?
            .to_string();
        if !check_name(&name) {
            return Err(Error::name(
                line.number,
                format!("invalid part name '{name}'"),
            ));
        }
        if self.circuit.device_index(&name).is_some() {
            return Err(Error::name(
                line.number,
                format!("redefinition of part name '{name}'"),
            ));
        }

        // `: value [, value]*` with values matched to the declared
        // parameters by quantity rather than position.
        let mut values: Vec<(Quantity, f64)> = Vec::new();
        let mut idx = 2;
        while idx < line.tokens.len() {
            let separator = if values.is_empty() {
                Token::Colon
            } else {
                Token::Comma
            };
            self.keyword(line, idx, &separator)?;
            let literal = self.word(line, idx + 1, "a value")?;
            let value = units::parse_value(literal).ok_or_else(|| {
                Error::value(line.number, format!("invalid value '{literal}'"))
            })?;
            values.push(value);
            idx += 2;
        }

        let device = self.build_device(kind, &name, &values, line.number)?;
        self.circuit.add_device(device)?;
        Ok(())
    }

    fn build_device(
        &self,
        kind: &str,
        name: &str,
        values: &[(Quantity, f64)],
        line: usize,
    ) -> Result<Device> {
        use Quantity::*;
        let device = match kind {
            "resistor" => {
                let p = resolve_params(kind, name, &[Param(Resistance, None)], values, line)?;
                Resistor::new(name, p[0]).into()
            }
            "capacitor" => {
                let p = resolve_params(kind, name, &[Param(Capacitance, None)], values, line)?;
                Capacitor::new(name, p[0]).into()
            }
            "inductor" => {
                let p = resolve_params(kind, name, &[Param(Inductance, None)], values, line)?;
                Inductor::new(name, p[0]).into()
            }
            "current_source" => {
                let p = resolve_params(kind, name, &[Param(Current, None)], values, line)?;
                CurrentSource::new(name, p[0]).into()
            }
            "voltage_source" => {
                let p = resolve_params(kind, name, &[Param(Voltage, None)], values, line)?;
                VoltageSource::new(name, p[0]).into()
            }
            "voltage_source_2P" => {
                let p = resolve_params(kind, name, &[Param(Voltage, None)], values, line)?;
                VoltageSource2::new(name, p[0]).into()
            }
            "ac_voltage_source" | "ac_voltage_source_2P" => {
                let specs = [
                    Param(Frequency, None),
                    Param(Voltage, None),
                    Param(Angle, Some(0.0)),
                ];
                let p = resolve_params(kind, name, &specs, values, line)?;
                if kind == "ac_voltage_source" {
                    AcVoltageSource::new(name, p[0], p[1], p[2]).into()
                } else {
                    AcVoltageSource2::new(name, p[0], p[1], p[2]).into()
                }
            }
            "switch" => {
                resolve_params(kind, name, &[], values, line)?;
                Switch::new(name).into()
            }
            "op_amp" => {
                let specs = [
                    Param(Voltage, Some(-12.0)),
                    Param(Voltage, Some(12.0)),
                    Param(Dimensionless, Some(1e5)),
                ];
                let p = resolve_params(kind, name, &specs, values, line)?;
                OpAmp::new(name, p[0], p[1], p[2]).into()
            }
            _ => unreachable!("kind comes from DEVICE_KINDS"),
        };
        Ok(device)
    }

    // --- pins and connections ---

    /// Resolve a pin reference: `partname` (one-pin part, or two-pin
    /// shorthand when allowed) or `partname.pinname` with a pin index or
    /// symbolic pin name.
    fn parse_pin(&self, word: &str, line: usize, shorthand_pin: Option<usize>) -> Result<PinRef> {
        let Some(dot) = word.rfind('.') else {
            let device = self.lookup(word, line)?;
            let count = self.circuit.device(device).pin_count();
            return match (count, shorthand_pin) {
                (1, _) => Ok(PinRef::new(device, 0)),
                (2, Some(pin)) => Ok(PinRef::new(device, pin)),
                _ => Err(Error::name(line, format!("invalid pin name '{word}'"))),
            };
        };

        if dot == 0 || dot + 1 == word.len() {
            return Err(Error::name(line, format!("invalid pin name '{word}'")));
        }
        let (part, pin_name) = (&word[..dot], &word[dot + 1..]);
        let device = self.lookup(part, line)?;
        let model = self.circuit.device(device);
        let pin = match pin_name.parse::<usize>() {
            Ok(index) if index < model.pin_count() => Some(index),
            Ok(_) => None,
            Err(_) => model.pin_named(pin_name),
        };
        pin.map(|p| PinRef::new(device, p))
            .ok_or_else(|| Error::name(line, format!("{part} doesn't have pin {pin_name}")))
    }

    /// `pin - pin [- pin]*`. Two-pin shorthand reads left to right: a bare
    /// two-pin part contributes pin 1 on the left of a `-` and pin 0 on
    /// the right, so chains wire in series.
    fn connections(&mut self, line: &Line) -> Result<()> {
        let mut idx = 0;
        loop {
            let left = self.word(line, idx, "a pin name")?;
            let a = self.parse_pin(left, line.number, Some(1))?;
            if idx + 1 >= line.tokens.len() {
                return Ok(());
            }
            self.keyword(line, idx + 1, &Token::Dash)?;
            let right = self.word(line, idx + 2, "a pin name after '-'")?;
            let b = self.parse_pin(right, line.number, Some(0))?;
            self.circuit.connect(a, b);
            idx += 2;
        }
    }

    // --- scopes ---

    fn scope_decl(&mut self, line: &Line) -> Result<()> {
        let quantity = self.word(line, 1, "'current' or 'voltage' after 'scope'")?;
        let is_current = match quantity {
            "current" => true,
            "voltage" => false,
            other => {
                return Err(Error::syntax(
                    line.number,
                    format!("expected 'current' or 'voltage' after 'scope', got '{other}'"),
                ))
            }
        };

        let mode = self.word(line, 2, &format!("'of' or 'between' after 'scope {quantity}'"))?;
        let (name, a, b) = match mode {
            "of" => {
                let part = self.word(line, 3, "a part name after 'of'")?;
                self.end(line, 4)?;
                let device = self.lookup(part, line.number)?;
                if self.circuit.device(device).pin_count() != 2 {
                    return Err(Error::syntax(
                        line.number,
                        format!("expected a 2-pin part after 'scope {quantity} of', got '{part}'"),
                    ));
                }
                (
                    format!("{quantity}_of_{part}"),
                    PinRef::new(device, 0),
                    PinRef::new(device, 1),
                )
            }
            "between" => {
                let first = self.word(line, 3, "a pin name after 'between'")?;
                self.keyword(line, 4, &Token::Word("and".into()))?;
                let second = self.word(line, 5, "a pin name after 'and'")?;
                self.end(line, 6)?;
                let a = self.parse_pin(first, line.number, None)?;
                let b = self.parse_pin(second, line.number, None)?;
                if is_current && a.device != b.device {
                    return Err(Error::value(
                        line.number,
                        format!("current scope needs two pins of one part, got '{first}' and '{second}'"),
                    ));
                }
                (format!("{quantity}_between_{first}_and_{second}"), a, b)
            }
            other => {
                return Err(Error::syntax(
                    line.number,
                    format!("expected 'of' or 'between' after 'scope {quantity}', got '{other}'"),
                ))
            }
        };

        self.scopes.push(if is_current {
            Scope::current(name, a, b)
        } else {
            Scope::voltage(name, a, b)
        });
        Ok(())
    }

    // --- switch commands ---

    fn turn_decl(&mut self, line: &Line) -> Result<()> {
        let state = self.word(line, 1, "'on' or 'off' after 'turn'")?;
        let closed = match state {
            "on" => true,
            "off" => false,
            other => {
                return Err(Error::syntax(
                    line.number,
                    format!("expected 'on' or 'off' after 'turn', got '{other}'"),
                ))
            }
        };

        let name = self.word(line, 2, &format!("a switch name after 'turn {state}'"))?;
        let device = self.lookup(name, line.number)?;
        self.keyword(line, 3, &Token::Word("at".into()))?;
        let literal = self.word(line, 4, "a time value after 'at'")?;
        self.end(line, 5)?;

        let (quantity, time) = units::parse_value(literal)
            .ok_or_else(|| Error::value(line.number, format!("invalid value '{literal}'")))?;
        if quantity != Quantity::Time {
            return Err(Error::value(
                line.number,
                format!("expected a time value after 'at', got a {quantity}"),
            ));
        }

        let switch = self
            .circuit
            .device_mut(device)
            .as_switch_mut()
            .ok_or_else(|| Error::value(line.number, format!("'{name}' is not a switch")))?;
        if closed {
            switch.schedule_on(time);
        } else {
            switch.schedule_off(time);
        }
        Ok(())
    }
}

/// Match parsed values against declared parameters by quantity; missing
/// ones fall back to their default.
fn resolve_params(
    kind: &str,
    name: &str,
    specs: &[Param],
    values: &[(Quantity, f64)],
    line: usize,
) -> Result<Vec<f64>> {
    if values.len() > specs.len() {
        return Err(Error::syntax(
            line,
            format!("too many parameters for {kind} {name}"),
        ));
    }

    let mut used = vec![false; values.len()];
    let mut out = Vec::with_capacity(specs.len());
    for Param(want, default) in specs {
        let found = values
            .iter()
            .enumerate()
            .find(|(i, (quantity, _))| !used[*i] && quantity == want);
        match found {
            Some((i, &(_, value))) => {
                used[i] = true;
                out.push(value);
            }
            None => match default {
                Some(value) => out.push(*value),
                None => {
                    return Err(Error::value(
                        line,
                        format!("missing {want} parameter for {kind} {name}"),
                    ))
                }
            },
        }
    }

    if let Some(i) = used.iter().position(|&u| !u) {
        return Err(Error::value(
            line,
            format!("unexpected {} parameter for {kind} {name}", values[i].0),
        ));
    }
    Ok(out)
}
