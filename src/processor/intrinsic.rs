//! Built-in I/O routines, recognised by name instead of through the symbol table.

use super::instruction::Operation;
use super::symbols::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    GetInt,
    GetDouble,
    GetChar,
    PutInt,
    PutDouble,
    PutChar,
    PutStr,
    PutLn,
}

impl Intrinsic {
    pub fn from_name(name: &str) -> Option<Intrinsic> {
        use Intrinsic as I;
        Some(match name {
            "getint" => I::GetInt,
            "getdouble" => I::GetDouble,
            "getchar" => I::GetChar,
            "putint" => I::PutInt,
            "putdouble" => I::PutDouble,
            "putchar" => I::PutChar,
            "putstr" => I::PutStr,
            "putln" => I::PutLn,
            _ => return None,
        })
    }

    /// The single instruction a call lowers to.
    #[rustfmt::skip]
    pub fn operation(self) -> Operation {
        use Intrinsic as I;
        match self {
            I::GetInt    => Operation::ScanI,
            I::GetDouble => Operation::ScanF,
            I::GetChar   => Operation::ScanC,
            I::PutInt    => Operation::PrintI,
            I::PutDouble => Operation::PrintF,
            I::PutChar   => Operation::PrintC,
            I::PutStr    => Operation::PrintS,
            I::PutLn     => Operation::PrintLn,
        }
    }

    pub fn params(self) -> &'static [ValueType] {
        use Intrinsic as I;
        match self {
            I::GetInt | I::GetDouble | I::GetChar | I::PutLn => &[],
            I::PutInt | I::PutChar => &[ValueType::Int],
            I::PutDouble => &[ValueType::Double],
            I::PutStr => &[ValueType::String],
        }
    }

    pub fn return_type(self) -> ValueType {
        use Intrinsic as I;
        match self {
            I::GetInt | I::GetChar => ValueType::Int,
            I::GetDouble => ValueType::Double,
            I::PutInt | I::PutDouble | I::PutChar | I::PutStr | I::PutLn => ValueType::Void,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let test_cases = vec![
            ("getint", Some(Intrinsic::GetInt)),
            ("putln", Some(Intrinsic::PutLn)),
            ("putstr", Some(Intrinsic::PutStr)),
            ("print", None),
            ("main", None),
        ];

        for (name, expected) in test_cases {
            assert_eq!(Intrinsic::from_name(name), expected, "{name}");
        }
    }

    #[test]
    fn test_getchar_yields_int() {
        assert_eq!(Intrinsic::GetChar.return_type(), ValueType::Int);
        assert_eq!(Intrinsic::GetChar.operation(), Operation::ScanC);
    }
}
