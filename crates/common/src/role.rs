//! 角色枚举
//!
//! 认证声明、证书类型与权限判断共用同一个枚举，避免多处定义产生漂移。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 平台角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Participant,
    Communicant,
    MembreComite,
    Organisateur,
    Invite,
    SuperAdmin,
}

impl Role {
    /// 可以签发证书的类型
    pub const ATTESTATION_TYPES: [Role; 5] = [
        Role::Participant,
        Role::Communicant,
        Role::MembreComite,
        Role::Organisateur,
        Role::Invite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Participant => "participant",
            Role::Communicant => "communicant",
            Role::MembreComite => "membre_comite",
            Role::Organisateur => "organisateur",
            Role::Invite => "invite",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// 解析证书类型；`super_admin` 不是证书类型
    pub fn attestation_type(raw: &str) -> Option<Role> {
        raw.parse::<Role>()
            .ok()
            .filter(|role| role.is_attestation_type())
    }

    pub fn is_attestation_type(&self) -> bool {
        !matches!(self, Role::SuperAdmin)
    }

    /// 证书上显示的标签
    pub fn attestation_label(&self) -> &'static str {
        match self {
            Role::Participant => "Attestation de participation",
            Role::Communicant => "Attestation de communication",
            Role::MembreComite => "Attestation de membre du comite scientifique",
            Role::Organisateur => "Attestation d'organisation",
            Role::Invite => "Attestation d'intervention",
            Role::SuperAdmin => "Attestation",
        }
    }

    /// 是否可以管理证书（组织者仅限自己的活动，由调用方校验归属）
    pub fn can_manage_attestations(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Organisateur)
    }

    pub fn can_delete_attestations(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "participant" => Ok(Role::Participant),
            "communicant" => Ok(Role::Communicant),
            "membre_comite" => Ok(Role::MembreComite),
            "organisateur" => Ok(Role::Organisateur),
            "invite" => Ok(Role::Invite),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role {}", other)),
        }
    }
}
