use enumset::{enum_set, EnumSet};

/// Runtime permissions a host may gate Bluetooth use behind.  Only
/// [RadioPermission::Advertise] is consulted by the controller, the rest exist so a shell can
/// ask for everything it needs in one go.
#[derive(Debug, enumset::EnumSetType)]
pub enum RadioPermission {
  Advertise,
  Connect,
  Scan,
  FineLocation,
  CoarseLocation,
}

/// Everything a typical advertising shell asks the user for up front.
pub const REQUIRED_PERMISSIONS: EnumSet<RadioPermission> = enum_set!(
  RadioPermission::Advertise
    | RadioPermission::Connect
    | RadioPermission::Scan
    | RadioPermission::FineLocation
    | RadioPermission::CoarseLocation
);

/// Answers whether a permission is currently granted.  Consulted synchronously before every
/// radio operation, so implementations must be cheap and must not block on user interaction.
pub trait AccessChecker {
  fn is_granted(&self, permission: RadioPermission) -> bool;
}

impl<F> AccessChecker for F
where
  F: Fn(RadioPermission) -> bool,
{
  fn is_granted(&self, permission: RadioPermission) -> bool {
    (self)(permission)
  }
}

/// Permissions from `required` that `checker` reports as not granted.  An empty result means the
/// shell can go ahead without prompting.
pub fn missing_permissions(
  checker: &impl AccessChecker,
  required: EnumSet<RadioPermission>,
) -> EnumSet<RadioPermission> {
  required
    .iter()
    .filter(|p| !checker.is_granted(*p))
    .collect()
}
