//! Command lines sent to the servers
//!
//! Every remote command runs in a fresh shell, so commands that work inside
//! the release directory change into it first.

use crate::release::{join_remote, Revision, REVISION_FILE};
use crate::shell::quote_arg;

/// Prefix `command` with a change into `dir`
pub fn in_dir(dir: &str, command: &str) -> String {
    format!("cd {} && {}", quote_arg(dir), command)
}

pub fn create_release_path(release_path: &str) -> String {
    format!("mkdir -p {}", quote_arg(release_path))
}

pub fn init_repository(release_path: &str) -> String {
    in_dir(release_path, "git init")
}

pub fn add_remote(release_path: &str, remote_name: &str, repository_url: &str) -> String {
    in_dir(
        release_path,
        &format!(
            "git remote add {} {}",
            quote_arg(remote_name),
            quote_arg(repository_url)
        ),
    )
}

pub fn fetch(release_path: &str, remote_name: &str, branch: &str) -> String {
    in_dir(
        release_path,
        &format!("git fetch {} {}", quote_arg(remote_name), quote_arg(branch)),
    )
}

pub fn checkout(release_path: &str, branch: &str) -> String {
    in_dir(release_path, &format!("git checkout {}", quote_arg(branch)))
}

pub fn resolve_revision(release_path: &str, branch: &str) -> String {
    in_dir(release_path, &format!("git rev-parse {}", quote_arg(branch)))
}

/// `echo` adds the trailing newline the REVISION file carries
pub fn write_revision(release_path: &str, revision: &Revision) -> String {
    format!(
        "echo {} > {}",
        quote_arg(revision.as_str()),
        quote_arg(&join_remote(release_path, REVISION_FILE))
    )
}

/// Point `<deploy_to>/<link>` at `target` by renaming a fresh symlink over it,
/// so readers see either the old or the new release and never a missing link.
pub fn swap_symlink(deploy_to: &str, target: &str, link: &str) -> String {
    let tmp = format!("{}_tmp", link);
    in_dir(
        deploy_to,
        &format!(
            "ln -nfs {target} {tmp} && mv -fT {tmp} {link}",
            target = quote_arg(target),
            tmp = quote_arg(&tmp),
            link = quote_arg(link)
        ),
    )
}
