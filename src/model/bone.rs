/// Skeleton bones addressed by the low byte of a node id.
#[repr(u8)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BoneId {
    Root = 0,
    Spine = 1,
    RightShoulder = 4,
    RightUpperArm = 5,
    RightLowerArm = 6,
    RightWrist = 7,
    RightRiggedHand = 8,
    LeftShoulder = 9,
    LeftUpperArm = 10,
    LeftLowerArm = 11,
    LeftWrist = 12,
    LeftRiggedHand = 13,
    Hip = 14,
    RightUpperLeg = 16,
    RightLowerLeg = 17,
    RightFoot = 18,
    RightFootToes = 19,
    LeftUpperLeg = 21,
    LeftLowerLeg = 22,
    LeftFoot = 23,
    LeftFootToes = 24,
    RightHandThumb = 25,
    RightHandIndexUpper = 28,
    RightHandIndexLower = 29,
    RightHandFingerUpper = 31,
    RightHandFingerLower = 32,
    LeftHandThumb = 40,
    LeftHandIndexUpper = 43,
    LeftHandIndexLower = 44,
    LeftHandFingerUpper = 46,
    LeftHandFingerLower = 47,
    Jaw = 188,
    Head = 189,
    LeftHand = 190,
    RightHand = 191,
    #[default]
    None = 0xFF,
}

impl BoneId {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => BoneId::Root,
            1 => BoneId::Spine,
            4 => BoneId::RightShoulder,
            5 => BoneId::RightUpperArm,
            6 => BoneId::RightLowerArm,
            7 => BoneId::RightWrist,
            8 => BoneId::RightRiggedHand,
            9 => BoneId::LeftShoulder,
            10 => BoneId::LeftUpperArm,
            11 => BoneId::LeftLowerArm,
            12 => BoneId::LeftWrist,
            13 => BoneId::LeftRiggedHand,
            14 => BoneId::Hip,
            16 => BoneId::RightUpperLeg,
            17 => BoneId::RightLowerLeg,
            18 => BoneId::RightFoot,
            19 => BoneId::RightFootToes,
            21 => BoneId::LeftUpperLeg,
            22 => BoneId::LeftLowerLeg,
            23 => BoneId::LeftFoot,
            24 => BoneId::LeftFootToes,
            25 => BoneId::RightHandThumb,
            28 => BoneId::RightHandIndexUpper,
            29 => BoneId::RightHandIndexLower,
            31 => BoneId::RightHandFingerUpper,
            32 => BoneId::RightHandFingerLower,
            40 => BoneId::LeftHandThumb,
            43 => BoneId::LeftHandIndexUpper,
            44 => BoneId::LeftHandIndexLower,
            46 => BoneId::LeftHandFingerUpper,
            47 => BoneId::LeftHandFingerLower,
            188 => BoneId::Jaw,
            189 => BoneId::Head,
            190 => BoneId::LeftHand,
            191 => BoneId::RightHand,
            _ => BoneId::None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BoneId::Root => "Root",
            BoneId::Spine => "Spine",
            BoneId::RightShoulder => "RightShoulder",
            BoneId::RightUpperArm => "RightUpperArm",
            BoneId::RightLowerArm => "RightLowerArm",
            BoneId::RightWrist => "RightWrist",
            BoneId::RightRiggedHand => "RightRiggedHand",
            BoneId::LeftShoulder => "LeftShoulder",
            BoneId::LeftUpperArm => "LeftUpperArm",
            BoneId::LeftLowerArm => "LeftLowerArm",
            BoneId::LeftWrist => "LeftWrist",
            BoneId::LeftRiggedHand => "LeftRiggedHand",
            BoneId::Hip => "Hip",
            BoneId::RightUpperLeg => "RightUpperLeg",
            BoneId::RightLowerLeg => "RightLowerLeg",
            BoneId::RightFoot => "RightFoot",
            BoneId::RightFootToes => "RightFootToes",
            BoneId::LeftUpperLeg => "LeftUpperLeg",
            BoneId::LeftLowerLeg => "LeftLowerLeg",
            BoneId::LeftFoot => "LeftFoot",
            BoneId::LeftFootToes => "LeftFootToes",
            BoneId::RightHandThumb => "RightHandThumb",
            BoneId::RightHandIndexUpper => "RightHandIndexUpper",
            BoneId::RightHandIndexLower => "RightHandIndexLower",
            BoneId::RightHandFingerUpper => "RightHandFingerUpper",
            BoneId::RightHandFingerLower => "RightHandFingerLower",
            BoneId::LeftHandThumb => "LeftHandThumb",
            BoneId::LeftHandIndexUpper => "LeftHandIndexUpper",
            BoneId::LeftHandIndexLower => "LeftHandIndexLower",
            BoneId::LeftHandFingerUpper => "LeftHandFingerUpper",
            BoneId::LeftHandFingerLower => "LeftHandFingerLower",
            BoneId::Jaw => "Jaw",
            BoneId::Head => "Head",
            BoneId::LeftHand => "LeftHand",
            BoneId::RightHand => "RightHand",
            BoneId::None => "None",
        }
    }
}
