//! Symbolic-or-octal mode string parsing for `-perm`, modeled on GNU
//! `chmod`'s `mode_compile`/`mode_adjust` pair (§6 collaborator contract).
//!
//! `find -perm` never has an existing file mode to adjust relative to: the
//! prefix character (`-`, `/`, or bare) only selects *how* the compiled
//! value is compared against the file's actual mode (`PermMatch` in
//! `predicate.rs`), not what the compiled value itself is. So unlike
//! `chmod`, which adjusts a file's current mode, `compile` here always
//! starts from a mode of `0` and returns the two masks GNU find's
//! `parse_perm` computes — one with the `X` ("executable if a directory")
//! letter resolved against a non-directory, one against a directory.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Add,
    Remove,
    Set,
}

#[derive(Clone, Copy, Debug, Default)]
struct PermBits {
    read: bool,
    write: bool,
    exec: bool,
    /// `X`: executable if a directory, or if any execute bit is already
    /// set for some category by an earlier clause in this same spec.
    exec_if_dir_or_already_exec: bool,
    setid: bool,
    sticky: bool,
}

#[derive(Clone, Copy, Debug)]
struct Clause {
    who: u32, // bitwise-or of WHO_* below; 0 means "all, per umask" (umask is always 0 here)
    op: Op,
    perm: PermBits,
}

const WHO_USER: u32 = 0b001;
const WHO_GROUP: u32 = 0b010;
const WHO_OTHER: u32 = 0b100;
const WHO_ALL: u32 = WHO_USER | WHO_GROUP | WHO_OTHER;

/// A compiled `-perm` mode spec: a sequence of clauses applied in order.
#[derive(Clone, Debug)]
pub struct ModeChange {
    clauses: Vec<Clause>,
}

/// Parse either an octal literal (`644`, `0755`) or a comma-separated
/// symbolic spec (`u+x,go-w`, `a=r`, `+X`) into a `ModeChange`.
pub fn compile(spec: &str) -> Result<ModeChange, String> {
    if spec.is_empty() {
        return Err("invalid mode (empty)".to_string());
    }
    if spec.as_bytes()[0].is_ascii_digit() {
        return compile_octal(spec);
    }
    compile_symbolic(spec)
}

fn compile_octal(spec: &str) -> Result<ModeChange, String> {
    let val = u32::from_str_radix(spec, 8)
        .map_err(|_| format!("invalid mode `{}'", spec))?;
    if val > 0o7777 {
        return Err(format!("invalid mode `{}'", spec));
    }
    // Octal specs are a single "set everything" clause; represent it as
    // one clause per who-class so exact bits transfer through unchanged,
    // plus one clause each for setuid/setgid/sticky (each toggled
    // independently since they don't live in any who-class's rwx group).
    let mut clauses = Vec::new();
    for (who, shift) in [(WHO_USER, 6), (WHO_GROUP, 3), (WHO_OTHER, 0)] {
        let bits = (val >> shift) & 0o7;
        clauses.push(Clause {
            who,
            op: Op::Set,
            perm: PermBits {
                read: bits & 0b100 != 0,
                write: bits & 0b010 != 0,
                exec: bits & 0b001 != 0,
                exec_if_dir_or_already_exec: false,
                setid: false,
                sticky: false,
            },
        });
    }
    clauses.push(Clause {
        who: WHO_USER,
        op: if val & 0o4000 != 0 { Op::Add } else { Op::Remove },
        perm: PermBits { setid: true, ..Default::default() },
    });
    clauses.push(Clause {
        who: WHO_GROUP,
        op: if val & 0o2000 != 0 { Op::Add } else { Op::Remove },
        perm: PermBits { setid: true, ..Default::default() },
    });
    clauses.push(Clause {
        who: WHO_OTHER,
        op: if val & 0o1000 != 0 { Op::Add } else { Op::Remove },
        perm: PermBits { sticky: true, ..Default::default() },
    });
    Ok(ModeChange { clauses })
}

fn compile_symbolic(spec: &str) -> Result<ModeChange, String> {
    let mut clauses = Vec::new();
    for clause_str in spec.split(',') {
        if clause_str.is_empty() {
            return Err(format!("invalid mode `{}'", spec));
        }
        let bytes: Vec<char> = clause_str.chars().collect();
        let mut i = 0;
        let mut who = 0u32;
        while i < bytes.len() {
            match bytes[i] {
                'u' => who |= WHO_USER,
                'g' => who |= WHO_GROUP,
                'o' => who |= WHO_OTHER,
                'a' => who |= WHO_ALL,
                _ => break,
            }
            i += 1;
        }
        if who == 0 {
            who = WHO_ALL;
        }
        loop {
            let op = match bytes.get(i) {
                Some('+') => Op::Add,
                Some('-') => Op::Remove,
                Some('=') => Op::Set,
                Some(c) => return Err(format!("invalid mode `{}': unexpected `{}'", spec, c)),
                None => return Err(format!("invalid mode `{}'", spec)),
            };
            i += 1;
            let mut perm = PermBits::default();
            while let Some(&c) = bytes.get(i) {
                match c {
                    'r' => perm.read = true,
                    'w' => perm.write = true,
                    'x' => perm.exec = true,
                    'X' => perm.exec_if_dir_or_already_exec = true,
                    's' => perm.setid = true,
                    't' => perm.sticky = true,
                    '+' | '-' | '=' => break,
                    ',' => break,
                    _ => return Err(format!("invalid mode `{}': unexpected `{}'", spec, c)),
                }
                i += 1;
            }
            clauses.push(Clause { who, op, perm });
            if !matches!(bytes.get(i), Some('+') | Some('-') | Some('=')) {
                break;
            }
        }
    }
    Ok(ModeChange { clauses })
}

/// Apply `change` starting from mode `0`, resolving `X` against `is_dir`.
/// This is `mode_adjust(0, is_dir, umask=0, change)` from the collaborator
/// contract in §6; `find -perm` never has a real umask to honor.
pub fn adjust(change: &ModeChange, is_dir: bool) -> u32 {
    let mut mode: u32 = 0;
    for clause in &change.clauses {
        let exec_bit = clause.perm.exec
            || (clause.perm.exec_if_dir_or_already_exec
                && (is_dir || mode & 0o111 != 0));
        let mut add = 0u32;
        if clause.who & WHO_USER != 0 {
            if clause.perm.read {
                add |= 0o400;
            }
            if clause.perm.write {
                add |= 0o200;
            }
            if exec_bit {
                add |= 0o100;
            }
            if clause.perm.setid {
                add |= 0o4000;
            }
        }
        if clause.who & WHO_GROUP != 0 {
            if clause.perm.read {
                add |= 0o040;
            }
            if clause.perm.write {
                add |= 0o020;
            }
            if exec_bit {
                add |= 0o010;
            }
            if clause.perm.setid {
                add |= 0o2000;
            }
        }
        if clause.who & WHO_OTHER != 0 {
            if clause.perm.read {
                add |= 0o004;
            }
            if clause.perm.write {
                add |= 0o002;
            }
            if exec_bit {
                add |= 0o001;
            }
        }
        if clause.perm.sticky {
            add |= 0o1000;
        }
        let mut clear = 0u32;
        if clause.who & WHO_USER != 0 {
            clear |= 0o4700;
        }
        if clause.who & WHO_GROUP != 0 {
            clear |= 0o2070;
        }
        if clause.who & WHO_OTHER != 0 {
            clear |= 0o0007;
        }
        if clause.perm.sticky {
            clear |= 0o1000;
        }
        match clause.op {
            Op::Add => mode |= add,
            Op::Remove => mode &= !add,
            Op::Set => mode = (mode & !clear) | add,
        }
    }
    mode
}

/// `-perm MODE`/`-perm -MODE`/`-perm /MODE`: parse the prefix, compile the
/// rest, and return the `(file_bits, dir_bits)` pair `PrimaryKind::Perm`
/// stores, matching `parse_perm`'s `perm_val[0]`/`perm_val[1]`.
pub fn parse_perm_arg(
    arg: &str,
) -> Result<(crate::predicate::PermMatch, u32, u32), String> {
    use crate::predicate::PermMatch;

    let (how, rest) = match arg.as_bytes().first() {
        Some(b'-') => (PermMatch::AllOf, &arg[1..]),
        Some(b'/') => (PermMatch::AnyOf, &arg[1..]),
        _ => (PermMatch::Exact, arg),
    };
    if rest.is_empty() {
        return Err(format!("invalid mode `{}'", arg));
    }
    let change = compile(rest)?;
    let file_bits = adjust(&change, false);
    let dir_bits = adjust(&change, true);
    Ok((how, file_bits, dir_bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octal_round_trips_exactly() {
        let change = compile("0644").unwrap();
        assert_eq!(adjust(&change, false), 0o644);
        assert_eq!(adjust(&change, true), 0o644);
    }

    #[test]
    fn octal_with_setuid_and_sticky() {
        let change = compile("4755").unwrap();
        assert_eq!(adjust(&change, false), 0o4755);
    }

    #[test]
    fn symbolic_add_and_remove() {
        let change = compile("u+x,go-w").unwrap();
        // starting from 0: u+x sets 0100; go-w removes nothing from 0.
        assert_eq!(adjust(&change, false), 0o100);
    }

    #[test]
    fn symbolic_capital_x_depends_on_directory() {
        let change = compile("a+X").unwrap();
        assert_eq!(adjust(&change, false), 0);
        assert_eq!(adjust(&change, true), 0o111);
    }

    #[test]
    fn symbolic_capital_x_after_explicit_exec() {
        let change = compile("u+x,a+X").unwrap();
        // u+x already set 0100, so X now sees "already executable" and
        // applies to g/o as well even for a non-directory.
        assert_eq!(adjust(&change, false), 0o111);
    }

    #[test]
    fn parse_perm_arg_prefixes_select_match_kind() {
        use crate::predicate::PermMatch;
        assert_eq!(
            parse_perm_arg("-644").unwrap().0,
            PermMatch::AllOf
        );
        assert_eq!(parse_perm_arg("/111").unwrap().0, PermMatch::AnyOf);
        assert_eq!(parse_perm_arg("644").unwrap().0, PermMatch::Exact);
    }
}
