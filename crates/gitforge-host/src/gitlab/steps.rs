// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GitLab source-install provisioning steps.
//!
//! Each step is guarded by the file or directory its last action produces, so
//! a rerun after a failure resumes at the step that failed. Steps without such
//! a marker (package installs, group membership, permission fixes, git config)
//! always run and are safe to repeat.

use gitforge_core::precondition::Precondition;
use gitforge_core::runner::CommandSpec;
use gitforge_core::step::ProvisioningStep;

pub(crate) const GITLAB_HOME: &str = "/home/git/gitlab";

const RUBY_VERSION: &str = "2.7.4";
const RUBY_SHA256: &str = "3043099089608859fc8cce7f9fdccaa1f53a462457e3838ec3b25a7d609fbc5b";
const GO_VERSION: &str = "1.15.12";
const GO_SHA256: &str = "bbdb935699e0b24d90e2451346da76121b2412d30930eabcd80907c230d098b7";
const NODE_SETUP: &str = "/tmp/setup_14.x";

const BUILD_PACKAGES: &[&str] = &[
    "build-essential",
    "zlib1g-dev",
    "libyaml-dev",
    "libssl-dev",
    "libgdbm-dev",
    "libre2-dev",
    "libreadline-dev",
    "libncurses5-dev",
    "libffi-dev",
    "curl",
    "openssh-server",
    "libxml2-dev",
    "libxslt-dev",
    "libcurl4-openssl-dev",
    "libicu-dev",
    "logrotate",
    "rsync",
    "python-docutils",
    "pkg-config",
    "cmake",
    "runit-systemd",
    "libkrb5-dev",
];

const GIT_BUILD_PACKAGES: &[&str] = &[
    "libcurl4-openssl-dev",
    "libexpat1-dev",
    "gettext",
    "libz-dev",
    "libssl-dev",
    "libpcre2-dev",
    "build-essential",
    "git-core",
];

const EXTRA_PACKAGES: &[&str] = &["graphicsmagick", "postfix", "libimage-exiftool-perl"];

fn apt_get() -> CommandSpec {
    CommandSpec::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
}

fn apt_install(packages: &[&str]) -> CommandSpec {
    apt_get()
        .args(["install", "-y", "--no-install-recommends"])
        .args(packages.iter().copied())
}

fn download(url: &str, output: &str) -> CommandSpec {
    CommandSpec::new("curl").args(["--fail", "--silent", "--show-error", "--location", "--output", output, url])
}

/// Download `url` next to `tarball` and move it into place once complete.
///
/// `tarball` is the step's marker, so an interrupted transfer never leaves it
/// behind and the retry downloads again instead of failing checksum
/// verification forever.
fn download_tarball(step: ProvisioningStep, url: &str, tarball: &str) -> ProvisioningStep {
    let partial = format!("{}.part", tarball);
    step.run(download(url, &partial))
        .run(CommandSpec::new("mv").args([partial.as_str(), tarball]))
}

fn git_config(key: &str, value: &str) -> CommandSpec {
    CommandSpec::new("git")
        .args(["config", "--global", key, value])
        .run_as("git")
}

fn chmod_recursive(mode: &str, dir: &str) -> CommandSpec {
    CommandSpec::new("chmod")
        .args(["-R", mode, dir])
        .current_dir(GITLAB_HOME)
}

/// The ordered install pipeline for `release_branch` (e.g. `14-3-stable`).
pub fn provisioning_steps(release_branch: &str) -> Vec<ProvisioningStep> {
    let ruby_dir = "/tmp/ruby";
    let ruby_tarball = format!("{}/ruby-{}.tar.gz", ruby_dir, RUBY_VERSION);
    let ruby_src = format!("{}/ruby-{}", ruby_dir, RUBY_VERSION);
    let go_tarball = format!("/tmp/go{}.linux-amd64.tar.gz", GO_VERSION);

    vec![
        ProvisioningStep::new("packages")
            .run(apt_get().arg("update"))
            .run(apt_install(BUILD_PACKAGES))
            .run(apt_install(GIT_BUILD_PACKAGES))
            .run(apt_install(EXTRA_PACKAGES)),
        ProvisioningStep::new("git")
            .unless(Precondition::path("/usr/local/bin/git"))
            .run(CommandSpec::new("rm").args(["-rf", "/tmp/gitaly"]))
            .run(CommandSpec::new("git").args([
                "clone",
                "https://gitlab.com/gitlab-org/gitaly.git",
                "-b",
                release_branch,
                "/tmp/gitaly",
            ]))
            .run(
                CommandSpec::new("make")
                    .args(["git", "GIT_PREFIX=/usr/local"])
                    .current_dir("/tmp/gitaly"),
            ),
        download_tarball(
            ProvisioningStep::new("ruby-download")
                .unless(Precondition::path(&ruby_tarball))
                .run(CommandSpec::new("mkdir").args(["-p", ruby_dir])),
            &format!("https://cache.ruby-lang.org/pub/ruby/2.7/ruby-{}.tar.gz", RUBY_VERSION),
            &ruby_tarball,
        ),
        ProvisioningStep::new("ruby-extract")
            .unless(Precondition::path(&ruby_src))
            .verify_sha256(&ruby_tarball, RUBY_SHA256)
            .run(
                CommandSpec::new("tar")
                    .args(["xzf", ruby_tarball.as_str()])
                    .current_dir(ruby_dir),
            ),
        ProvisioningStep::new("ruby")
            .unless(Precondition::path("/usr/local/bin/ruby"))
            .run(
                CommandSpec::new("./configure")
                    .args(["--disable-install-rdoc", "--enable-shared"])
                    .current_dir(&ruby_src),
            )
            .run(CommandSpec::new("make").current_dir(&ruby_src))
            .run(CommandSpec::new("make").arg("install").current_dir(&ruby_src)),
        download_tarball(
            ProvisioningStep::new("go-download").unless(Precondition::path(&go_tarball)),
            &format!("https://dl.google.com/go/go{}.linux-amd64.tar.gz", GO_VERSION),
            &go_tarball,
        ),
        ProvisioningStep::new("go")
            .unless(Precondition::all_paths([
                "/usr/local/bin/go",
                "/usr/local/bin/godoc",
                "/usr/local/bin/gofmt",
            ]))
            .verify_sha256(&go_tarball, GO_SHA256)
            .run(CommandSpec::new("rm").args(["-rf", "/usr/local/go"]))
            .run(CommandSpec::new("tar").args(["-C", "/usr/local", "-xzf", go_tarball.as_str()]))
            .symlink("/usr/local/go/bin/go", "/usr/local/bin/go")
            .symlink("/usr/local/go/bin/godoc", "/usr/local/bin/godoc")
            .symlink("/usr/local/go/bin/gofmt", "/usr/local/bin/gofmt"),
        ProvisioningStep::new("node")
            .unless(Precondition::path("/usr/bin/node"))
            .run(download("https://deb.nodesource.com/setup_14.x", NODE_SETUP))
            .run(CommandSpec::new("bash").arg(NODE_SETUP))
            .run(apt_install(&["nodejs"])),
        ProvisioningStep::new("yarn")
            .unless(Precondition::path("/usr/bin/yarn"))
            .run(CommandSpec::new("npm").args(["install", "--global", "yarn"])),
        ProvisioningStep::new("system-user")
            .unless(Precondition::path("/home/git"))
            .run(CommandSpec::new("adduser").args(["--disabled-login", "--gecos", "GitLab", "git"])),
        ProvisioningStep::new("redis")
            .unless(Precondition::path("/usr/bin/redis-server"))
            .run(apt_install(&["redis-server"])),
        // The git user reaches redis through its socket
        ProvisioningStep::new("redis-group")
            .run(CommandSpec::new("usermod").args(["-aG", "redis", "git"])),
        ProvisioningStep::new("gitlab-clone")
            .unless(Precondition::path(GITLAB_HOME))
            .run(
                CommandSpec::new("git")
                    .args([
                        "clone",
                        "https://gitlab.com/gitlab-org/gitlab-foss.git",
                        "-b",
                        release_branch,
                        "gitlab",
                    ])
                    .current_dir("/home/git")
                    .run_as("git"),
            ),
        ProvisioningStep::new("gitlab-permissions")
            .run(CommandSpec::new("chown").args(["-R", "git", "log/"]).current_dir(GITLAB_HOME))
            .run(chmod_recursive("u+rwX,go-w", "log/"))
            .run(chmod_recursive("u+rwX", "tmp/"))
            .run(chmod_recursive("u+rwX", "tmp/pids/"))
            .run(chmod_recursive("u+rwX", "tmp/sockets/"))
            .run(chmod_recursive("u+rwX", "builds/"))
            .run(chmod_recursive("u+rwX", "shared/artifacts/"))
            .run(chmod_recursive("ug+rwX", "shared/pages/")),
        ProvisioningStep::new("gitlab-uploads")
            .run(
                CommandSpec::new("mkdir")
                    .args(["-p", "public/uploads/"])
                    .current_dir(GITLAB_HOME)
                    .run_as("git"),
            )
            .run(
                CommandSpec::new("chmod")
                    .args(["0700", "public/uploads"])
                    .current_dir(GITLAB_HOME),
            ),
        ProvisioningStep::new("git-config")
            .run(git_config("core.autocrlf", "input"))
            .run(git_config("gc.auto", "0"))
            .run(git_config("repack.writeBitmaps", "true"))
            .run(git_config("receive.advertisePushOptions", "true"))
            .run(git_config("core.fsyncObjectFiles", "true")),
        ProvisioningStep::new("nginx")
            .unless(Precondition::path("/etc/nginx/sites-enabled/gitlab"))
            .run(apt_install(&["nginx"]))
            .symlink("/etc/nginx/sites-available/gitlab", "/etc/nginx/sites-enabled/gitlab"),
    ]
}
