//! Language-standard selector (`--std`).

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LangStd {
    C99,
    C11,
    Cxx98,
    Cxx03,
    Cxx11,
    Cxx14,
    Cxx17,
    OpenCl10,
    OpenCl11,
    OpenCl12,
    OpenCl20,
    OpenCl21,
    OpenCl22,
}

impl LangStd {
    pub fn parse(name: &str) -> Option<LangStd> {
        use LangStd::*;
        Some(match name {
            "c99" => C99,
            "c11" => C11,
            "c++98" => Cxx98,
            "c++03" => Cxx03,
            "c++11" => Cxx11,
            "c++14" => Cxx14,
            "c++17" => Cxx17,
            "opencl_1_0" => OpenCl10,
            "opencl_1_1" => OpenCl11,
            "opencl_1_2" => OpenCl12,
            "opencl_2_0" => OpenCl20,
            "opencl_2_1" => OpenCl21,
            "opencl_2_2" => OpenCl22,
            _ => return None,
        })
    }

    pub fn is_c(self) -> bool {
        matches!(self, LangStd::C99 | LangStd::C11)
    }

    pub fn is_cxx(self) -> bool {
        matches!(self, LangStd::Cxx98 | LangStd::Cxx03 | LangStd::Cxx11 | LangStd::Cxx14 | LangStd::Cxx17)
    }

    pub fn is_opencl(self) -> bool {
        matches!(
            self,
            LangStd::OpenCl10 | LangStd::OpenCl11 | LangStd::OpenCl12 | LangStd::OpenCl20 | LangStd::OpenCl21 | LangStd::OpenCl22
        )
    }
}

impl fmt::Display for LangStd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LangStd::*;
        let s = match self {
            C99 => "c99",
            C11 => "c11",
            Cxx98 => "c++98",
            Cxx03 => "c++03",
            Cxx11 => "c++11",
            Cxx14 => "c++14",
            Cxx17 => "c++17",
            OpenCl10 => "opencl_1_0",
            OpenCl11 => "opencl_1_1",
            OpenCl12 => "opencl_1_2",
            OpenCl20 => "opencl_2_0",
            OpenCl21 => "opencl_2_1",
            OpenCl22 => "opencl_2_2",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_round_trips_through_display() {
        for std in [LangStd::C99, LangStd::Cxx17, LangStd::OpenCl12] {
            assert_eq!(LangStd::parse(&std.to_string()), Some(std));
        }
    }

    #[test]
    fn parse_rejects_unknown_name() {
        assert_eq!(LangStd::parse("c89"), None);
    }

    #[test]
    fn classification_is_mutually_exclusive() {
        for std in [
            LangStd::C99, LangStd::C11, LangStd::Cxx98, LangStd::Cxx11, LangStd::Cxx17,
            LangStd::OpenCl10, LangStd::OpenCl20,
        ] {
            let flags = [std.is_c(), std.is_cxx(), std.is_opencl()];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        }
    }
}
