//! 权限需求

/// 受保护操作要求的权限
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// 单个权限
    One(String),
    /// 任一权限即可；空列表永不满足
    Any(Vec<String>),
    /// 需全部权限；空列表总是满足
    All(Vec<String>),
}

impl Requirement {
    pub fn one(code: impl Into<String>) -> Self {
        Self::One(code.into())
    }

    pub fn any<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Any(codes.into_iter().map(Into::into).collect())
    }

    pub fn all<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::All(codes.into_iter().map(Into::into).collect())
    }

    /// 涉及的权限代码
    pub fn codes(&self) -> &[String] {
        match self {
            Self::One(code) => std::slice::from_ref(code),
            Self::Any(codes) | Self::All(codes) => codes,
        }
    }

    /// 以给定的判定函数求值
    pub fn is_satisfied_by(&self, mut holds: impl FnMut(&str) -> bool) -> bool {
        match self {
            Self::One(code) => holds(code),
            Self::Any(codes) => codes.iter().any(|c| holds(c)),
            Self::All(codes) => codes.iter().all(|c| holds(c)),
        }
    }
}
