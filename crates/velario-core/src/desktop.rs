//! Locating the desktop icon view.
//!
//! The shell's window layout is undocumented and moved between OS
//! releases: the icon view normally sits under the primary shell
//! window, but some versions host it under one of the secondary
//! worker windows instead. The search itself is plain logic, so it
//! lives here behind a trait; the platform crate supplies the actual
//! window handles.

/// The shell window tree as seen by the icon-view search.
///
/// One implementation per platform, plus mocks in tests.
pub trait DesktopShell {
    /// Opaque window handle.
    type Handle: Copy;

    /// The primary top-level shell window, if present.
    fn primary_shell(&self) -> Option<Self::Handle>;

    /// The icon view directly under `host`, if present.
    fn icon_view_in(&self, host: Self::Handle) -> Option<Self::Handle>;

    /// Iterates the secondary host windows. `after` of `None` returns
    /// the first one; passing the previous result returns the next.
    fn next_secondary_host(&self, after: Option<Self::Handle>) -> Option<Self::Handle>;
}

/// Finds the desktop icon view: primary shell window first, then each
/// secondary host in turn. Returns `None` when the desktop exposes no
/// icon view anywhere.
pub fn locate_icon_view<S: DesktopShell>(shell: &S) -> Option<S::Handle> {
    if let Some(primary) = shell.primary_shell()
        && let Some(view) = shell.icon_view_in(primary)
    {
        return Some(view);
    }

    let mut host = shell.next_secondary_host(None);
    while let Some(h) = host {
        if let Some(view) = shell.icon_view_in(h) {
            return Some(view);
        }
        host = shell.next_secondary_host(Some(h));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fake shell tree over plain integers.
    struct FakeShell {
        primary: Option<u32>,
        /// (host, view) pairs.
        views: Vec<(u32, u32)>,
        secondary_hosts: Vec<u32>,
    }

    impl DesktopShell for FakeShell {
        type Handle = u32;

        fn primary_shell(&self) -> Option<u32> {
            self.primary
        }

        fn icon_view_in(&self, host: u32) -> Option<u32> {
            self.views.iter().find(|(h, _)| *h == host).map(|(_, v)| *v)
        }

        fn next_secondary_host(&self, after: Option<u32>) -> Option<u32> {
            match after {
                None => self.secondary_hosts.first().copied(),
                Some(prev) => {
                    let idx = self.secondary_hosts.iter().position(|h| *h == prev)?;
                    self.secondary_hosts.get(idx + 1).copied()
                }
            }
        }
    }

    #[test]
    fn finds_view_under_primary_shell() {
        let shell = FakeShell {
            primary: Some(1),
            views: vec![(1, 100)],
            secondary_hosts: vec![],
        };

        assert_eq!(locate_icon_view(&shell), Some(100));
    }

    #[test]
    fn falls_back_to_secondary_hosts() {
        // Primary shell exists but has no icon view; the third worker
        // window hosts it instead.
        let shell = FakeShell {
            primary: Some(1),
            views: vec![(12, 100)],
            secondary_hosts: vec![10, 11, 12],
        };

        assert_eq!(locate_icon_view(&shell), Some(100));
    }

    #[test]
    fn falls_back_when_primary_shell_is_absent() {
        let shell = FakeShell {
            primary: None,
            views: vec![(10, 100)],
            secondary_hosts: vec![10],
        };

        assert_eq!(locate_icon_view(&shell), Some(100));
    }

    #[test]
    fn returns_none_when_no_host_exposes_the_view() {
        let shell = FakeShell {
            primary: Some(1),
            views: vec![],
            secondary_hosts: vec![10, 11],
        };

        assert_eq!(locate_icon_view(&shell), None);
    }
}
